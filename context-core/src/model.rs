//! The memory entity and its supporting value types.
//!
//! A [`Memory`] lives in exactly one [`Tier`] at a time, carries a
//! [`Metadata`] record, and (tier 3 only) an embedding and a decaying
//! relevance score.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Embedding dimension produced by the embedding service.
pub const EMBEDDING_DIM: usize = 384;

/// Which of the three storage tiers a memory currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tier {
    /// In-process working cache, TTL + LRU bounded.
    Working = 1,
    /// Durable per-project store.
    Project = 2,
    /// Durable global store with embeddings and decay.
    Semantic = 3,
}

impl Tier {
    /// Parse a tier from its numeric representation, as accepted at the
    /// engine boundary for explicit-tier placement and promotion requests.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Working),
            2 => Some(Self::Project),
            3 => Some(Self::Semantic),
            _ => None,
        }
    }

    /// The next tier up, or `None` if already terminal (tier 3).
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Working => Some(Self::Project),
            Self::Project => Some(Self::Semantic),
            Self::Semantic => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The closed set of first-class memory types, plus legacy types accepted
/// on read: legacy types are queryable as-is and are never silently
/// rewritten to a closed-set variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    CodePattern,
    BugFix,
    Decision,
    Convention,
    Scratchpad,
    Relationship,
    /// A type outside the closed set, preserved verbatim from ingest
    /// (`code`, `message`, `thought`, `observation`, `documentation`,
    /// `error`, `summary`, or any other string a caller supplies).
    #[serde(untagged)]
    Legacy(String),
}

impl MemoryType {
    /// The canonical string form used for storage and the wire protocol.
    pub fn as_str(&self) -> &str {
        match self {
            Self::CodePattern => "code_pattern",
            Self::BugFix => "bug_fix",
            Self::Decision => "decision",
            Self::Convention => "convention",
            Self::Scratchpad => "scratchpad",
            Self::Relationship => "relationship",
            Self::Legacy(s) => s,
        }
    }

    /// Parse from the wire string, mapping closed-set names to their
    /// variant and everything else to [`MemoryType::Legacy`].
    pub fn parse(s: &str) -> Self {
        match s {
            "code_pattern" => Self::CodePattern,
            "bug_fix" => Self::BugFix,
            "decision" => Self::Decision,
            "convention" => Self::Convention,
            "scratchpad" => Self::Scratchpad,
            "relationship" => Self::Relationship,
            other => Self::Legacy(other.to_string()),
        }
    }

    /// Legacy types that the router sends to tier 1.
    pub fn is_legacy_working(&self) -> bool {
        matches!(self.as_str(), "message" | "thought" | "observation")
    }

    /// Legacy types that the router sends to tier 2.
    pub fn is_legacy_project(&self) -> bool {
        matches!(
            self.as_str(),
            "documentation" | "error" | "summary"
        )
    }

    pub fn is_legacy_code(&self) -> bool {
        self.as_str() == "code"
    }
}

/// Where a memory's content/confidence originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    UserExplicit,
    AiInferred,
    SystemAuto,
}

impl Default for Source {
    fn default() -> Self {
        Self::AiInferred
    }
}

/// Location of a file-backed memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileContext {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// An embedded snippet of code attached to a memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub code: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// A typed edge from one memory to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub kind: String,
    pub target_id: String,
}

/// Structured memory metadata. Kept as a typed record rather than a raw
/// JSON blob; `extra` is the forward-compatible escape hatch for fields
/// this crate doesn't yet model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metadata {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_context: Option<FileContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_block: Option<CodeBlock>,
    #[serde(default)]
    pub relationships: Vec<RelationshipEdge>,
    /// Weight in `1..=5`, default 3; boosts hybrid recall ranking.
    #[serde(default = "default_weight")]
    pub weight: u8,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_weight() -> u8 {
    3
}

impl Metadata {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Clamp weight into the documented `1..=5` range, defaulting to 3.
    pub fn clamped_weight(&self) -> u8 {
        self.weight.clamp(1, 5)
    }
}

/// The primary entity stored by every tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub tier: Tier,
    pub content: String,
    pub metadata: Metadata,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_accessed_at: i64,
    pub access_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    pub pinned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl Memory {
    /// Build a freshly-created memory; `tier` is assigned by the router,
    /// not chosen here.
    pub fn new(memory_type: MemoryType, tier: Tier, content: String, metadata: Metadata) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4().to_string(),
            memory_type,
            tier,
            content,
            metadata,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl: None,
            pinned: false,
            embedding: None,
            relevance_score: None,
        }
    }

    /// `true` for a tier-1 entry whose ttl has elapsed.
    pub fn is_expired(&self, now: i64) -> bool {
        match self.ttl {
            Some(ttl) if ttl > 0 => now >= self.created_at + (ttl as i64) * 1000,
            _ => false,
        }
    }

    /// Record a read: bump `accessCount` and `lastAccessedAt`.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = now_ms();
    }
}

/// Current epoch time in milliseconds, the unit every timestamp in this
/// crate uses.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Per-project key/value metadata. The reserved key
/// `last_seen` holds the epoch-ms timestamp of the most recent `orient` call.
pub const LAST_SEEN_KEY: &str = "last_seen";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetaEntry {
    pub value: String,
    pub updated_at: i64,
}

/// A contiguous line range of a source file, the unit of code-index search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub file_path: String,
    pub language: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
}

/// The kind of a symbol extracted from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Type,
    Enum,
    Const,
    Export,
    Method,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Enum => "enum",
            Self::Const => "const",
            Self::Export => "export",
            Self::Method => "method",
        }
    }
}

/// A named declaration extracted from a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSymbol {
    pub file_path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub signature: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_round_trips_closed_set() {
        for s in [
            "code_pattern",
            "bug_fix",
            "decision",
            "convention",
            "scratchpad",
            "relationship",
        ] {
            assert_eq!(MemoryType::parse(s).as_str(), s);
        }
    }

    #[test]
    fn legacy_type_preserved_verbatim() {
        let t = MemoryType::parse("thought");
        assert_eq!(t.as_str(), "thought");
        assert!(t.is_legacy_working());
    }

    #[test]
    fn weight_clamps_into_range() {
        let mut m = Metadata::default();
        m.weight = 9;
        assert_eq!(m.clamped_weight(), 5);
        m.weight = 0;
        assert_eq!(m.clamped_weight(), 1);
    }

    #[test]
    fn expiry_uses_ttl_seconds() {
        let mut mem = Memory::new(
            MemoryType::Scratchpad,
            Tier::Working,
            "x".into(),
            Metadata::default(),
        );
        mem.ttl = Some(10);
        assert!(!mem.is_expired(mem.created_at + 9_000));
        assert!(mem.is_expired(mem.created_at + 10_000));
    }
}
