//! Tier-1 working store: an in-process, TTL- and LRU-bounded cache (spec
//! §4.2). Never durable; dropped whole on engine teardown.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::model::{now_ms, Memory};

/// Insertion-ordered map from id to memory, guarded by a single mutex:
/// mutating operations are serialized per tier, matching the concurrency
/// model in spec §5 (reads could fan out further, but L1 is cheap enough
/// that a single lock never becomes the bottleneck).
pub struct Tier1Store {
    capacity: usize,
    default_ttl_seconds: u64,
    entries: Mutex<BTreeMap<String, Memory>>,
}

impl Tier1Store {
    pub fn new(capacity: usize, default_ttl_seconds: u64) -> Self {
        Self {
            capacity,
            default_ttl_seconds,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Insert a freshly-routed memory, assigning its ttl and evicting the
    /// least-recently-accessed entry first if at capacity.
    pub fn store(&self, mut memory: Memory, ttl: Option<u64>) -> Memory {
        let ttl = ttl.unwrap_or(self.default_ttl_seconds);
        memory.ttl = Some(ttl);
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            evict_lru(&mut entries);
        }
        entries.insert(memory.id.clone(), memory.clone());
        memory
    }

    /// Look up by id; bumps `lastAccessedAt`/`accessCount` on a live hit,
    /// returns `None` for an absent or expired entry.
    pub fn get(&self, id: &str) -> Option<Memory> {
        let mut entries = self.entries.lock();
        let now = now_ms();
        let expired = entries.get(id).is_some_and(|m| m.is_expired(now));
        if expired {
            entries.remove(id);
            return None;
        }
        let memory = entries.get_mut(id)?;
        memory.touch();
        Some(memory.clone())
    }

    /// All live (non-expired) entries, most-recently-accessed first.
    pub fn get_all(&self) -> Vec<Memory> {
        let entries = self.entries.lock();
        let now = now_ms();
        let mut live: Vec<Memory> = entries
            .values()
            .filter(|m| !m.is_expired(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        live
    }

    /// Case-insensitive substring scan over live entries (spec §4.2
    /// "substring-match search is linear scan, case-insensitive").
    pub fn search_substring(&self, query: &str) -> Vec<Memory> {
        let query = query.to_lowercase();
        self.get_all()
            .into_iter()
            .filter(|m| m.content.to_lowercase().contains(&query))
            .collect()
    }

    pub fn delete(&self, id: &str) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Sweep expired entries; returns the count removed. Intended to run on
    /// a ~60s timer (spec §4.2).
    pub fn cleanup(&self) -> usize {
        let mut entries = self.entries.lock();
        let now = now_ms();
        let before = entries.len();
        entries.retain(|_, m| !m.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remove the entry with the smallest `lastAccessedAt` (creation time if
/// never accessed), per spec §4.2's eviction policy.
fn evict_lru(entries: &mut BTreeMap<String, Memory>) {
    if let Some(victim) = entries
        .values()
        .min_by_key(|m| m.last_accessed_at)
        .map(|m| m.id.clone())
    {
        entries.remove(&victim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metadata, MemoryType, Tier};

    fn mem(content: &str) -> Memory {
        Memory::new(MemoryType::Scratchpad, Tier::Working, content.into(), Metadata::default())
    }

    #[test]
    fn store_then_get_round_trips() {
        let store = Tier1Store::new(10, 3600);
        let m = store.store(mem("hello"), None);
        let got = store.get(&m.id).unwrap();
        assert_eq!(got.content, "hello");
        assert_eq!(got.access_count, 1);
    }

    #[test]
    fn default_ttl_applies_when_unspecified() {
        let store = Tier1Store::new(10, 3600);
        let m = store.store(mem("x"), None);
        assert_eq!(m.ttl, Some(3600));
    }

    #[test]
    fn expired_entry_is_absent_from_get_and_get_all() {
        let store = Tier1Store::new(10, 3600);
        let mut m = mem("temp");
        m.ttl = Some(1);
        m.created_at = now_ms() - 5_000;
        store.entries.lock().insert(m.id.clone(), m.clone());
        assert!(store.get(&m.id).is_none());
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn eviction_removes_least_recently_accessed_at_capacity() {
        let store = Tier1Store::new(3, 3600);
        let a = store.store(mem("a"), None);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let _b = store.store(mem("b"), None);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let _c = store.store(mem("c"), None);
        std::thread::sleep(std::time::Duration::from_millis(2));
        // a is least-recently-accessed (never touched since creation); the
        // 4th insert should evict it.
        let _d = store.store(mem("d"), None);
        assert!(store.get(&a.id).is_none());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn cleanup_sweeps_expired_only() {
        let store = Tier1Store::new(10, 3600);
        let mut expired = mem("old");
        expired.ttl = Some(1);
        expired.created_at = now_ms() - 5_000;
        store.entries.lock().insert(expired.id.clone(), expired);
        store.store(mem("fresh"), None);
        let removed = store.cleanup();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn substring_search_is_case_insensitive() {
        let store = Tier1Store::new(10, 3600);
        store.store(mem("Hello World"), None);
        assert_eq!(store.search_substring("world").len(), 1);
        assert_eq!(store.search_substring("missing").len(), 0);
    }
}
