//! Storage-agnostic boundaries for the two durable tiers.
//!
//! `context-storage` implements these on top of libsql; tests in this crate
//! implement them on top of a `Vec`-backed double. The engine never depends
//! on a concrete backend, only on these traits (spec §9: "re-architect as
//! ... readers may use read-only handles concurrently").

use async_trait::async_trait;

use crate::api::CodeIndexStatus;
use crate::error::Result;
use crate::model::{CodeChunk, CodeSymbol, Memory, ProjectMetaEntry, SymbolKind};

/// Filter applied by `list` and by the durable tiers' own `list`/search
/// helpers. Cheap predicates (tier, project path) are pushed down to the
/// store; `types`/`tags` are applied by the caller when that's cheaper
/// (spec §4.6 "Filters").
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub types: Vec<String>,
    pub tags: Vec<String>,
    pub project_path: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Result of a tier-2 `summarize` call (spec §4.3).
#[derive(Debug, Clone)]
pub struct SummarizeResult {
    pub summary_id: String,
    pub count: usize,
    pub summary_text: String,
}

/// The durable per-project store (tier 2). One instance per project path;
/// two engines opened against the same path share the same underlying file
/// (spec §3 "the system guarantees at-most-one writer per project per
/// process" — enforced by the engine registry, not this trait).
#[async_trait]
pub trait Tier2Store: Send + Sync {
    async fn store(&self, memory: Memory) -> Result<Memory>;
    async fn get(&self, id: &str) -> Result<Option<Memory>>;
    /// Persist an in-place mutation. The caller (the engine) has already
    /// applied the content/metadata change and bumped `updated_at`.
    async fn put(&self, memory: &Memory) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<bool>;
    async fn search_like(&self, query: &str) -> Result<Vec<Memory>>;
    async fn search_bm25(&self, query: &str, limit: usize) -> Result<Vec<(Memory, f64)>>;
    async fn find_by_type(&self, memory_type: &str) -> Result<Vec<Memory>>;
    async fn get_recent(&self, n: usize) -> Result<Vec<Memory>>;
    async fn get_memories_since(&self, epoch_ms: i64) -> Result<Vec<Memory>>;
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Memory>>;
    async fn count(&self) -> Result<usize>;
    async fn count_pinned(&self) -> Result<usize>;
    async fn summarize(&self, older_than_days: f64, now_ms: i64) -> Result<SummarizeResult>;
    async fn get_last_seen(&self) -> Result<Option<ProjectMetaEntry>>;
    async fn update_last_seen(&self, epoch_ms: i64) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// The durable global store (tier 3), shared across all projects in the
/// process.
#[async_trait]
pub trait Tier3Store: Send + Sync {
    async fn store(&self, memory: Memory) -> Result<Memory>;
    async fn get(&self, id: &str) -> Result<Option<Memory>>;
    async fn put(&self, memory: &Memory) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<bool>;
    /// Cosine-ranked recall against a pre-computed query embedding, ties
    /// broken by `updated_at` descending (spec §4.4).
    async fn recall_semantic(
        &self,
        query_embedding: &[f64],
        limit: usize,
    ) -> Result<Vec<(Memory, f64)>>;
    async fn search_bm25(&self, query: &str, limit: usize) -> Result<Vec<(Memory, f64)>>;
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Memory>>;
    async fn count(&self) -> Result<usize>;
    async fn count_pinned(&self) -> Result<usize>;
    /// Recompute relevance scores and delete entries that cross the
    /// deletion threshold (spec §4.4 decay formula). Returns the deletion
    /// count.
    async fn apply_decay(
        &self,
        decay_days: f64,
        threshold: f64,
        now_ms: i64,
    ) -> Result<usize>;
    async fn close(&self) -> Result<()>;
}

/// Durable backing store for one project's code index (spec §4.8, §6
/// "one code-index database per project"). `context-storage` implements
/// this on libsql; the walking/chunking/extraction logic in
/// [`crate::code_index`] is backend-agnostic.
/// Opens the durable backends for one project, and the single process-wide
/// tier-3 backend. `context-storage` implements this on libsql;
/// [`crate::engine::EngineRegistry`] calls it once per project path
/// (single-flight, spec §9 "per-project engine instance map") and once for
/// tier 3 at process startup.
#[async_trait]
pub trait StorageFactory: Send + Sync {
    async fn open_tier2(&self, project_path: &str) -> Result<std::sync::Arc<dyn Tier2Store>>;
    async fn open_tier3(&self) -> Result<std::sync::Arc<dyn Tier3Store>>;
    async fn open_code_index_store(
        &self,
        project_path: &str,
    ) -> Result<std::sync::Arc<dyn CodeIndexStore>>;
}

#[async_trait]
pub trait CodeIndexStore: Send + Sync {
    /// The mtime (millis) this store last recorded for `file_path`, if any.
    async fn get_file_mtime(&self, file_path: &str) -> Result<Option<i64>>;
    /// Every tracked file and its recorded mtime, used to detect deletions.
    async fn all_files(&self) -> Result<Vec<(String, i64)>>;
    /// Record (or update) a file's language and mtime.
    async fn upsert_file(&self, file_path: &str, language: &str, mtime: i64) -> Result<()>;
    /// Replace all chunks previously stored for `file_path`.
    async fn replace_chunks(&self, file_path: &str, chunks: Vec<CodeChunk>) -> Result<()>;
    /// Replace all symbols previously stored for `file_path`.
    async fn replace_symbols(&self, file_path: &str, symbols: Vec<CodeSymbol>) -> Result<()>;
    /// Drop a file and everything derived from it (chunks, symbols, mtime).
    async fn remove_file(&self, file_path: &str) -> Result<()>;
    async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<CodeChunk>>;
    async fn search_symbol(
        &self,
        query: &str,
        kind: Option<SymbolKind>,
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CodeSymbol>>;
    async fn search_semantic(
        &self,
        query_embedding: &[f64],
        limit: usize,
    ) -> Result<Vec<(CodeChunk, f64)>>;
    async fn status(&self) -> Result<CodeIndexStatus>;
    async fn close(&self) -> Result<()>;
}
