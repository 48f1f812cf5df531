//! Request/response value types for the [`crate::engine::ContextEngine`]
//! facade (spec §4.9). Kept separate from [`crate::model`], which owns the
//! `Memory` entity itself.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{CodeSymbol, Memory, Metadata, MemoryType, SymbolKind, Tier};

/// Which ranker(s) `recall` fans out to (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallMode {
    Semantic,
    Keyword,
    Hybrid,
}

impl Default for RecallMode {
    fn default() -> Self {
        Self::Hybrid
    }
}

/// A post-fusion filter (spec §4.6 "Filters"): `types`/`tiers`/`tags` are
/// any-match, `project_path` is exact.
#[derive(Debug, Clone, Default)]
pub struct RecallFilter {
    pub types: Vec<String>,
    pub tiers: Vec<Tier>,
    pub tags: Vec<String>,
    pub project_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecallOptions {
    pub mode: RecallMode,
    pub limit: usize,
    pub threshold: f64,
    pub filter: Option<RecallFilter>,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            mode: RecallMode::default(),
            limit: 10,
            threshold: 0.7,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallHit {
    pub memory: Memory,
    pub similarity: f64,
    pub layer: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallResult {
    pub results: Vec<RecallHit>,
    pub total: usize,
}

/// Options accepted by `store` (spec §4.9 table), with defaults filled in
/// by the engine: confidence 0.8, source `ai_inferred`, `cli_type`
/// `generic`, `project_path` from the engine's own project path.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub metadata: Metadata,
    pub layer: Option<Tier>,
    pub ttl: Option<u64>,
    pub pinned: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreResult {
    pub id: String,
    pub success: bool,
    pub layer: u8,
    pub pinned: bool,
}

/// Fields an `update` call may change; omitted fields are left as-is.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub content: Option<String>,
    pub metadata: Option<Metadata>,
    pub tags: Option<Vec<String>>,
    pub weight: Option<u8>,
    pub pinned: Option<bool>,
    pub target_tier: Option<Tier>,
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub tier: Option<Tier>,
    pub memory_type: Option<String>,
    pub tags: Vec<String>,
    pub limit: usize,
    pub offset: usize,
    pub stats: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TierStats {
    pub tier1: usize,
    pub tier1_pinned: usize,
    pub tier2: usize,
    pub tier2_pinned: usize,
    pub tier3: usize,
    pub tier3_pinned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub memories: Vec<Memory>,
    pub stats: Option<TierStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromoteResult {
    pub new_id: String,
    pub new_tier: Tier,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeOutcome {
    pub summary_id: Option<String>,
    pub count: usize,
    pub deleted: usize,
}

/// A structured snapshot of a moment (spec GLOSSARY "TimeAnchor"). The
/// engine only fills in the epoch/ISO fields it owns; timezone-aware
/// rendering is an external collaborator's job (spec §1 Non-goal list).
#[derive(Debug, Clone, Serialize)]
pub struct TimeAnchor {
    pub epoch_ms: i64,
    pub iso: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfflineGap {
    pub duration_ms: i64,
    pub duration_human: String,
    pub from: i64,
    pub to: i64,
    pub memories_added: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrientResult {
    pub summary: String,
    pub time: TimeAnchor,
    pub project_path: String,
    pub offline_gap: Option<OfflineGap>,
    pub recent_memories: Vec<Memory>,
}

/// Which search strategy `search_code` uses (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSearchMode {
    Text,
    Symbol,
    Semantic,
}

impl Default for CodeSearchMode {
    fn default() -> Self {
        Self::Semantic
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodeSearchOptions {
    pub mode: CodeSearchMode,
    pub language: Option<String>,
    pub file_pattern: Option<String>,
    pub symbol_kind: Option<SymbolKind>,
    pub limit: usize,
    pub threshold: f64,
    pub include_content: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeSearchHit {
    pub file_path: String,
    pub language: String,
    pub start_line: u32,
    pub end_line: u32,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeIndexStatus {
    pub total_files: usize,
    pub total_symbols: usize,
    pub last_indexed_at: Option<i64>,
    pub is_stale: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeSearchResult {
    pub results: Vec<CodeSearchHit>,
    pub index_status: CodeIndexStatus,
    pub total: usize,
}

/// Preferences for `getContextWindow` (spec §4.9); every field falls back
/// to the engine's `ContextConfig` default when omitted.
#[derive(Debug, Clone, Default)]
pub struct ContextWindowPrefs {
    pub current_file_language: Option<String>,
    pub max_working_memories: Option<usize>,
    pub max_relevant_memories: Option<usize>,
    pub max_patterns: Option<usize>,
    pub max_ghost_messages: Option<usize>,
    pub max_suggestions: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextWindow {
    pub working: Vec<Memory>,
    pub relevant: Vec<ScoredMemory>,
    pub patterns: Vec<Memory>,
    pub suggestions: Vec<String>,
    pub ghost_messages: Vec<String>,
}

/// Bucket a type string into the table from spec §4.5/§4.9 used by
/// `getContextWindow`'s ghost-message/suggestion derivation.
pub fn is_decision_or_bugfix(memory_type: &MemoryType) -> bool {
    matches!(memory_type, MemoryType::Decision | MemoryType::BugFix)
        || memory_type.as_str() == "error"
}

/// A forward-compatible bag for engine-internal bookkeeping that doesn't
/// belong on the wire (kept here rather than threading more positional
/// arguments through `getContextWindow`'s helpers).
#[derive(Debug, Clone, Default)]
pub struct Scratch(pub HashMap<String, serde_json::Value>);
