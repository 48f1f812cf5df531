//! Row-table DDL for the durable tiers and the code index.

/// Tier-2 (per-project) and tier-3 (global) memories share one shape: the
/// embedding column is unused by tier 2 and always populated by tier 3.
pub const CREATE_MEMORIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY NOT NULL,
    memory_type TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    last_accessed_at INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    pinned INTEGER NOT NULL DEFAULT 0,
    project_path TEXT,
    embedding TEXT,
    relevance_score REAL
)
"#;

pub const CREATE_MEMORIES_UPDATED_AT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_memories_updated_at ON memories(updated_at DESC)
"#;

pub const CREATE_MEMORIES_TYPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type)
"#;

pub const CREATE_MEMORIES_PROJECT_PATH_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_memories_project_path ON memories(project_path)
"#;

/// Per-project key/value bookkeeping (spec §3 `ProjectMeta`): currently just
/// the `last_seen` timestamp `orient` reads and bumps.
pub const CREATE_PROJECT_META_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS project_meta (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

pub const CREATE_CODE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS code_files (
    file_path TEXT PRIMARY KEY NOT NULL,
    language TEXT NOT NULL,
    mtime_ms INTEGER NOT NULL
)
"#;

pub const CREATE_CODE_CHUNKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS code_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    language TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding TEXT
)
"#;

pub const CREATE_CODE_CHUNKS_FILE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_code_chunks_file ON code_chunks(file_path)
"#;

pub const CREATE_CODE_SYMBOLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS code_symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    signature TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    doc_comment TEXT
)
"#;

pub const CREATE_CODE_SYMBOLS_FILE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_code_symbols_file ON code_symbols(file_path)
"#;

pub const CREATE_CODE_SYMBOLS_NAME_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_code_symbols_name ON code_symbols(name)
"#;
