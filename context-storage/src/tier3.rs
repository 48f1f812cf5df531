//! `Tier3Store` on top of the single process-global libsql `memories`
//! database (spec §4.4). Same row shape as tier 2 ([`crate::tier2`]); the
//! difference is every row here carries an embedding and decay owns the
//! `relevance_score` column.

use std::sync::Arc;

use async_trait::async_trait;
use libsql::{params, Database};

use context_core::decay::{compute_relevance, is_significant_change};
use context_core::embedding::cosine_similarity;
use context_core::error::{Error, Result};
use context_core::model::{Memory, Tier, EMBEDDING_DIM};
use context_core::traits::{ListFilter, Tier3Store};

use crate::error::storage_error;
use crate::fts5_schema::normalize_bm25;
use crate::rows::{encode_memory, row_to_memory, MEMORY_COLUMNS};

pub struct LibsqlTier3Store {
    db: Arc<Database>,
}

impl LibsqlTier3Store {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<libsql::Connection> {
        self.db
            .connect()
            .map_err(|e| storage_error("failed to open connection", e))
    }
}

/// A tier-3 row must carry an embedding of exactly [`EMBEDDING_DIM`] (spec
/// §3 invariants). A mismatch (or a missing embedding) means the row was
/// corrupted by something outside this crate; surfacing it as
/// `StoreUnavailable` matches spec §8's boundary case rather than silently
/// dropping the row.
fn check_embedding_dimension(memory: &Memory) -> Result<()> {
    match &memory.embedding {
        Some(embedding) if embedding.len() == EMBEDDING_DIM => Ok(()),
        Some(embedding) => Err(Error::StoreUnavailable(format!(
            "tier-3 entry {} has embedding dimension {} (expected {EMBEDDING_DIM})",
            memory.id,
            embedding.len()
        ))),
        None => Err(Error::StoreUnavailable(format!(
            "tier-3 entry {} is missing its embedding",
            memory.id
        ))),
    }
}

#[async_trait]
impl Tier3Store for LibsqlTier3Store {
    async fn store(&self, memory: Memory) -> Result<Memory> {
        check_embedding_dimension(&memory)?;
        let conn = self.conn()?;
        let encoded = encode_memory(&memory)?;
        let sql = format!("INSERT INTO memories ({MEMORY_COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?,?,?,?)");
        conn.execute(
            &sql,
            params![
                memory.id.clone(),
                memory.memory_type.as_str().to_string(),
                memory.content.clone(),
                encoded.metadata_json,
                memory.created_at,
                memory.updated_at,
                memory.last_accessed_at,
                memory.access_count as i64,
                i64::from(memory.pinned),
                memory.metadata.project_path.clone(),
                encoded.embedding_json,
                memory.relevance_score,
            ],
        )
        .await
        .map_err(|e| storage_error("failed to insert memory", e))?;
        Ok(memory)
    }

    async fn get(&self, id: &str) -> Result<Option<Memory>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?");
        let mut rows = conn
            .query(&sql, params![id.to_string()])
            .await
            .map_err(|e| storage_error("failed to query memory", e))?;
        match rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch memory row", e))?
        {
            Some(row) => {
                let memory = row_to_memory(&row, Tier::Semantic)?;
                check_embedding_dimension(&memory)?;
                Ok(Some(memory))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, memory: &Memory) -> Result<()> {
        check_embedding_dimension(memory)?;
        let conn = self.conn()?;
        let encoded = encode_memory(memory)?;
        conn.execute(
            "UPDATE memories SET memory_type = ?, content = ?, metadata = ?, updated_at = ?, \
             last_accessed_at = ?, access_count = ?, pinned = ?, project_path = ?, embedding = ?, \
             relevance_score = ? WHERE id = ?",
            params![
                memory.memory_type.as_str().to_string(),
                memory.content.clone(),
                encoded.metadata_json,
                memory.updated_at,
                memory.last_accessed_at,
                memory.access_count as i64,
                i64::from(memory.pinned),
                memory.metadata.project_path.clone(),
                encoded.embedding_json,
                memory.relevance_score,
                memory.id.clone(),
            ],
        )
        .await
        .map_err(|e| storage_error("failed to update memory", e))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM memories WHERE id = ?", params![id.to_string()])
            .await
            .map_err(|e| storage_error("failed to delete memory", e))?;
        Ok(changed > 0)
    }

    /// Scans every row and ranks by cosine similarity (spec §4.4: "scans
    /// all entries"). Ties are broken by `updated_at` descending.
    async fn recall_semantic(
        &self,
        query_embedding: &[f64],
        limit: usize,
    ) -> Result<Vec<(Memory, f64)>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories");
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| storage_error("failed to scan memories", e))?;
        let mut scored = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch memory row", e))?
        {
            let memory = row_to_memory(&row, Tier::Semantic)?;
            let Some(embedding) = memory.embedding.as_deref() else {
                continue;
            };
            let similarity = cosine_similarity(query_embedding, embedding);
            scored.push((memory, similarity));
        }
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.updated_at.cmp(&a.0.updated_at))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn search_bm25(&self, query: &str, limit: usize) -> Result<Vec<(Memory, f64)>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT m.{cols}, bm25(memories_fts) AS rank FROM memories_fts \
             JOIN memories m ON m.id = memories_fts.id \
             WHERE memories_fts MATCH ? ORDER BY rank LIMIT ?",
            cols = MEMORY_COLUMNS
                .split(", ")
                .map(|c| format!("m.{c}"))
                .collect::<Vec<_>>()
                .join(", "),
        );
        let mut rows = match conn
            .query(&sql, params![query.to_string(), limit as i64])
            .await
        {
            Ok(rows) => rows,
            Err(_) => return Ok(Vec::new()),
        };
        let col_count = MEMORY_COLUMNS.split(", ").count();
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch bm25 row", e))?
        {
            let memory = row_to_memory(&row, Tier::Semantic)?;
            let raw_rank: f64 = row
                .get(col_count as i32)
                .map_err(|e| storage_error("column 'rank'", e))?;
            out.push((memory, normalize_bm25(raw_rank)));
        }
        Ok(out)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories ORDER BY updated_at DESC");
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| storage_error("failed to list memories", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch memory row", e))?
        {
            out.push(row_to_memory(&row, Tier::Semantic)?);
        }
        out.retain(|m| {
            (filter.types.is_empty() || filter.types.contains(&m.memory_type.as_str().to_string()))
                && (filter.tags.is_empty() || filter.tags.iter().any(|t| m.metadata.has_tag(t)))
                && filter
                    .project_path
                    .as_deref()
                    .is_none_or(|p| m.metadata.project_path.as_deref() == Some(p))
        });
        if filter.limit > 0 {
            let out = out
                .into_iter()
                .skip(filter.offset)
                .take(filter.limit)
                .collect();
            return Ok(out);
        }
        Ok(out.into_iter().skip(filter.offset).collect())
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM memories", ())
            .await
            .map_err(|e| storage_error("failed to count memories", e))?;
        let row = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch count row", e))?;
        let count: i64 = row
            .map(|r| r.get(0))
            .transpose()
            .map_err(|e| storage_error("column 'count'", e))?
            .unwrap_or(0);
        Ok(count as usize)
    }

    async fn count_pinned(&self) -> Result<usize> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM memories WHERE pinned != 0", ())
            .await
            .map_err(|e| storage_error("failed to count pinned memories", e))?;
        let row = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch count row", e))?;
        let count: i64 = row
            .map(|r| r.get(0))
            .transpose()
            .map_err(|e| storage_error("column 'count'", e))?
            .unwrap_or(0);
        Ok(count as usize)
    }

    /// Recomputes relevance for every non-pinned row (spec §4.4 formula,
    /// shared with [`context_core::decay`] so this crate never re-derives
    /// it) and deletes rows that cross `threshold`. Rows whose score moved
    /// by less than 0.01 are left unwritten to avoid write amplification.
    async fn apply_decay(&self, decay_days: f64, threshold: f64, now_ms: i64) -> Result<usize> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE pinned = 0"
        );
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| storage_error("failed to scan for decay", e))?;
        let mut candidates = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch memory row", e))?
        {
            candidates.push(row_to_memory(&row, Tier::Semantic)?);
        }

        let mut deleted = 0usize;
        for memory in candidates {
            let old_score = memory.relevance_score.unwrap_or(1.0);
            let new_score = compute_relevance(
                memory.created_at,
                memory.last_accessed_at,
                memory.access_count,
                now_ms,
                decay_days,
            );

            if new_score < threshold {
                if self.delete(&memory.id).await? {
                    deleted += 1;
                }
                continue;
            }

            if is_significant_change(old_score, new_score) {
                conn.execute(
                    "UPDATE memories SET relevance_score = ? WHERE id = ?",
                    params![new_score, memory.id.clone()],
                )
                .await
                .map_err(|e| storage_error("failed to persist decayed relevance score", e))?;
            }
        }
        Ok(deleted)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use context_core::model::{Memory, MemoryType, Metadata};
    use tempfile::TempDir;

    async fn store() -> (LibsqlTier3Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = crate::db::open_memories_db(&dir.path().join("semantic.db"))
            .await
            .unwrap();
        (LibsqlTier3Store::new(db), dir)
    }

    fn embedded_memory(content: &str, embedding: Vec<f64>) -> Memory {
        let mut memory = Memory::new(
            MemoryType::Scratchpad,
            Tier::Semantic,
            content.to_string(),
            Metadata::default(),
        );
        memory.embedding = Some(embedding);
        memory.relevance_score = Some(1.0);
        memory
    }

    fn unit_embedding(hot_index: usize) -> Vec<f64> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[hot_index] = 1.0;
        v
    }

    #[tokio::test]
    async fn store_rejects_missing_embedding() {
        let (store, _dir) = store().await;
        let memory = Memory::new(
            MemoryType::Scratchpad,
            Tier::Semantic,
            "no embedding".to_string(),
            Metadata::default(),
        );
        let err = store.store(memory).await.unwrap_err();
        assert_eq!(err.kind(), "StoreUnavailable");
    }

    #[tokio::test]
    async fn store_rejects_wrong_embedding_dimension() {
        let (store, _dir) = store().await;
        let memory = embedded_memory("short embedding", vec![0.1, 0.2]);
        let err = store.store(memory).await.unwrap_err();
        assert_eq!(err.kind(), "StoreUnavailable");
    }

    #[tokio::test]
    async fn store_then_get_round_trips_embedding() {
        let (store, _dir) = store().await;
        let memory = embedded_memory("hello", unit_embedding(0));
        let id = memory.id.clone();
        store.store(memory).await.unwrap();

        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
        assert_eq!(fetched.embedding.unwrap().len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn recall_semantic_ranks_by_cosine_similarity() {
        let (store, _dir) = store().await;
        store
            .store(embedded_memory("close match", unit_embedding(0)))
            .await
            .unwrap();
        store
            .store(embedded_memory("far match", unit_embedding(1)))
            .await
            .unwrap();

        let hits = store.recall_semantic(&unit_embedding(0), 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.content, "close match");
        assert!(hits[0].1 > hits[1].1);
    }

    #[tokio::test]
    async fn apply_decay_deletes_below_threshold_but_spares_pinned() {
        let (store, _dir) = store().await;
        let mut stale = embedded_memory("stale", unit_embedding(0));
        stale.created_at -= 365 * 24 * 60 * 60 * 1000;
        stale.last_accessed_at = stale.created_at;
        store.store(stale.clone()).await.unwrap();

        let mut pinned = embedded_memory("pinned stale", unit_embedding(1));
        pinned.created_at = stale.created_at;
        pinned.last_accessed_at = stale.created_at;
        pinned.pinned = true;
        store.store(pinned.clone()).await.unwrap();

        let deleted = store.apply_decay(30.0, 0.2, now_ms()).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get(&stale.id).await.unwrap().is_none());
        assert!(store.get(&pinned.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn apply_decay_is_idempotent_once_stable() {
        let (store, _dir) = store().await;
        store
            .store(embedded_memory("steady", unit_embedding(0)))
            .await
            .unwrap();

        let now = now_ms();
        let first = store.apply_decay(30.0, 0.0, now).await.unwrap();
        let second = store.apply_decay(30.0, 0.0, now).await.unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn count_and_count_pinned_reflect_store_state() {
        let (store, _dir) = store().await;
        store
            .store(embedded_memory("a", unit_embedding(0)))
            .await
            .unwrap();
        let mut pinned = embedded_memory("b", unit_embedding(1));
        pinned.pinned = true;
        store.store(pinned).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.count_pinned().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let (store, _dir) = store().await;
        let memory = embedded_memory("transient", unit_embedding(0));
        let id = memory.id.clone();
        store.store(memory).await.unwrap();

        assert!(store.delete(&id).await.unwrap());
        assert!(store.get(&id).await.unwrap().is_none());
        assert!(!store.delete(&id).await.unwrap());
    }
}
