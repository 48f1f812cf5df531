//! FTS5 virtual tables and sync triggers for BM25 keyword search (spec
//! §4.3 "Indexes"). One `memories_fts` table per durable tier (tier 2 and
//! tier 3 each own their own `memories` table and hence their own FTS
//! shadow), plus one over the code index's chunks.
//!
//! Tokenizer: porter unicode61, for stemmed, Unicode-aware tokenization.

pub const CREATE_MEMORIES_FTS_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    id UNINDEXED,
    content,
    tokenize='porter unicode61'
)
"#;

pub const CREATE_MEMORIES_FTS_TRIGGERS: &str = r#"
CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts(id, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
    UPDATE memories_fts SET content = new.content WHERE id = new.id;
END;

CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
    DELETE FROM memories_fts WHERE id = old.id;
END;
"#;

pub const CREATE_CODE_CHUNKS_FTS_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS code_chunks_fts USING fts5(
    chunk_id UNINDEXED,
    content,
    tokenize='porter unicode61'
)
"#;

pub const CREATE_CODE_CHUNKS_FTS_TRIGGERS: &str = r#"
CREATE TRIGGER IF NOT EXISTS code_chunks_ai AFTER INSERT ON code_chunks BEGIN
    INSERT INTO code_chunks_fts(chunk_id, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER IF NOT EXISTS code_chunks_au AFTER UPDATE ON code_chunks BEGIN
    UPDATE code_chunks_fts SET content = new.content WHERE chunk_id = new.id;
END;

CREATE TRIGGER IF NOT EXISTS code_chunks_ad AFTER DELETE ON code_chunks BEGIN
    DELETE FROM code_chunks_fts WHERE chunk_id = old.id;
END;
"#;

/// Map FTS5's unbounded `bm25()` (more negative is better) to the `[0, 1]`
/// range the hybrid pipeline's candidate scores use elsewhere (spec §4.3
/// "BM25 raw scores are normalized via `1 / (1 + |raw|)`").
pub fn normalize_bm25(raw: f64) -> f64 {
    1.0 / (1.0 + raw.abs())
}
