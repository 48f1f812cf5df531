//! `Memory`/`CodeChunk`/`CodeSymbol` <-> SQL row conversion, shared by the
//! tier-2, tier-3, and code-index store implementations. One function per
//! entity, column access by position, JSON-encoded blobs for anything
//! structured.

use libsql::Row;

use context_core::error::Result;
use context_core::model::{CodeChunk, CodeSymbol, Memory, Metadata, MemoryType, SymbolKind, Tier};

use crate::error::storage_error;

/// Column list shared by every `SELECT` against the `memories` table, kept
/// in one place so row-index reads in [`row_to_memory`] can't drift from
/// what's actually selected.
pub const MEMORY_COLUMNS: &str = "id, memory_type, content, metadata, created_at, updated_at, \
     last_accessed_at, access_count, pinned, project_path, embedding, relevance_score";

/// The encoded form of a [`Memory`]'s two JSON-blob columns. Callers bind
/// these alongside the memory's plain scalar fields with `libsql::params!`
/// at the call site (mirrors the teacher's inline-`params!` style rather
/// than threading an opaque params value through a helper).
pub struct EncodedMemory {
    pub metadata_json: String,
    pub embedding_json: Option<String>,
}

/// Pre-encode a [`Memory`]'s JSON columns for an `INSERT`/`UPDATE` against
/// `memories`.
pub fn encode_memory(memory: &Memory) -> Result<EncodedMemory> {
    let metadata_json = serde_json::to_string(&memory.metadata)
        .map_err(|e| storage_error("failed to encode metadata", e))?;
    let embedding_json = memory
        .embedding
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| storage_error("failed to encode embedding", e))?;
    Ok(EncodedMemory {
        metadata_json,
        embedding_json,
    })
}

/// Reconstruct a [`Memory`] from a row selected via [`MEMORY_COLUMNS`],
/// assigning it to `tier` (the table itself doesn't record which tier it
/// backs; that's implied by which store queried it).
pub fn row_to_memory(row: &Row, tier: Tier) -> Result<Memory> {
    let id: String = row.get(0).map_err(|e| storage_error("column 'id'", e))?;
    let memory_type: String = row
        .get(1)
        .map_err(|e| storage_error("column 'memory_type'", e))?;
    let content: String = row
        .get(2)
        .map_err(|e| storage_error("column 'content'", e))?;
    let metadata_json: String = row
        .get(3)
        .map_err(|e| storage_error("column 'metadata'", e))?;
    let created_at: i64 = row
        .get(4)
        .map_err(|e| storage_error("column 'created_at'", e))?;
    let updated_at: i64 = row
        .get(5)
        .map_err(|e| storage_error("column 'updated_at'", e))?;
    let last_accessed_at: i64 = row
        .get(6)
        .map_err(|e| storage_error("column 'last_accessed_at'", e))?;
    let access_count: i64 = row
        .get(7)
        .map_err(|e| storage_error("column 'access_count'", e))?;
    let pinned: i64 = row.get(8).map_err(|e| storage_error("column 'pinned'", e))?;
    let _project_path: Option<String> = row.get(9).ok();
    let embedding_json: Option<String> = row.get(10).ok();
    let relevance_score: Option<f64> = row.get(11).ok();

    let metadata: Metadata = serde_json::from_str(&metadata_json)
        .map_err(|e| storage_error("failed to decode metadata", e))?;
    let embedding = embedding_json
        .map(|s| serde_json::from_str::<Vec<f64>>(&s))
        .transpose()
        .map_err(|e| storage_error("failed to decode embedding", e))?;

    Ok(Memory {
        id,
        memory_type: MemoryType::parse(&memory_type),
        tier,
        content,
        metadata,
        created_at,
        updated_at,
        last_accessed_at,
        access_count: access_count as u64,
        ttl: None,
        pinned: pinned != 0,
        embedding,
        relevance_score,
    })
}

/// Reconstruct a [`CodeChunk`] from a row selected as
/// `file_path, language, start_line, end_line, content, embedding`.
pub fn row_to_code_chunk(row: &Row) -> Result<CodeChunk> {
    let file_path: String = row
        .get(0)
        .map_err(|e| storage_error("column 'file_path'", e))?;
    let language: String = row
        .get(1)
        .map_err(|e| storage_error("column 'language'", e))?;
    let start_line: i64 = row
        .get(2)
        .map_err(|e| storage_error("column 'start_line'", e))?;
    let end_line: i64 = row
        .get(3)
        .map_err(|e| storage_error("column 'end_line'", e))?;
    let content: String = row
        .get(4)
        .map_err(|e| storage_error("column 'content'", e))?;
    let embedding_json: Option<String> = row.get(5).ok();
    let embedding = embedding_json
        .map(|s| serde_json::from_str::<Vec<f64>>(&s))
        .transpose()
        .map_err(|e| storage_error("failed to decode chunk embedding", e))?;

    Ok(CodeChunk {
        file_path,
        language,
        start_line: start_line as u32,
        end_line: end_line as u32,
        content,
        embedding,
    })
}

/// Reconstruct a [`CodeSymbol`] from a row selected as
/// `file_path, name, kind, signature, start_line, end_line, doc_comment`.
pub fn row_to_code_symbol(row: &Row) -> Result<CodeSymbol> {
    let file_path: String = row
        .get(0)
        .map_err(|e| storage_error("column 'file_path'", e))?;
    let name: String = row.get(1).map_err(|e| storage_error("column 'name'", e))?;
    let kind: String = row.get(2).map_err(|e| storage_error("column 'kind'", e))?;
    let signature: String = row
        .get(3)
        .map_err(|e| storage_error("column 'signature'", e))?;
    let start_line: i64 = row
        .get(4)
        .map_err(|e| storage_error("column 'start_line'", e))?;
    let end_line: i64 = row
        .get(5)
        .map_err(|e| storage_error("column 'end_line'", e))?;
    let doc_comment: Option<String> = row.get(6).ok();

    Ok(CodeSymbol {
        file_path,
        name,
        kind: parse_symbol_kind(&kind),
        signature,
        start_line: start_line as u32,
        end_line: end_line as u32,
        doc_comment,
    })
}

fn parse_symbol_kind(s: &str) -> SymbolKind {
    match s {
        "class" => SymbolKind::Class,
        "interface" => SymbolKind::Interface,
        "type" => SymbolKind::Type,
        "enum" => SymbolKind::Enum,
        "const" => SymbolKind::Const,
        "export" => SymbolKind::Export,
        "method" => SymbolKind::Method,
        _ => SymbolKind::Function,
    }
}
