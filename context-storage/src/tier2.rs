//! `Tier2Store` on top of a single local libsql `memories` database (spec
//! §4.3). One instance per project path; `EngineRegistry` guarantees
//! at-most-one `LibsqlTier2Store` per path per process.

use std::sync::Arc;

use async_trait::async_trait;
use libsql::{params, Database};

use context_core::error::Result;
use context_core::model::{Memory, ProjectMetaEntry, Tier, LAST_SEEN_KEY};
use context_core::traits::{ListFilter, SummarizeResult, Tier2Store};

use crate::error::storage_error;
use crate::fts5_schema::normalize_bm25;
use crate::rows::{encode_memory, row_to_memory, MEMORY_COLUMNS};

pub struct LibsqlTier2Store {
    db: Arc<Database>,
}

impl LibsqlTier2Store {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<libsql::Connection> {
        self.db
            .connect()
            .map_err(|e| storage_error("failed to open connection", e))
    }
}

#[async_trait]
impl Tier2Store for LibsqlTier2Store {
    async fn store(&self, memory: Memory) -> Result<Memory> {
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
            Some(row) => Ok(Some(row_to_memory(&row, Tier::Project)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, memory: &Memory) -> Result<()> {
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

    async fn search_like(&self, query: &str) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE content LIKE ? ORDER BY updated_at DESC"
        );
        let pattern = format!("%{query}%");
        let mut rows = conn
            .query(&sql, params![pattern])
            .await
            .map_err(|e| storage_error("failed to search memories", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch memory row", e))?
        {
            out.push(row_to_memory(&row, Tier::Project)?);
        }
        Ok(out)
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
            // FTS5 MATCH raises a syntax error on malformed queries (bare
            // punctuation, unbalanced quotes); treat that as "no results"
            // rather than surfacing it as a store failure.
            Err(_) => return Ok(Vec::new()),
        };
        let col_count = MEMORY_COLUMNS.split(", ").count();
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch bm25 row", e))?
        {
            let memory = row_to_memory(&row, Tier::Project)?;
            let raw_rank: f64 = row
                .get(col_count as i32)
                .map_err(|e| storage_error("column 'rank'", e))?;
            out.push((memory, normalize_bm25(raw_rank)));
        }
        Ok(out)
    }

    async fn find_by_type(&self, memory_type: &str) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE memory_type = ? ORDER BY updated_at DESC"
        );
        let mut rows = conn
            .query(&sql, params![memory_type.to_string()])
            .await
            .map_err(|e| storage_error("failed to query by type", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch memory row", e))?
        {
            out.push(row_to_memory(&row, Tier::Project)?);
        }
        Ok(out)
    }

    async fn get_recent(&self, n: usize) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories ORDER BY updated_at DESC LIMIT ?");
        let mut rows = conn
            .query(&sql, params![n as i64])
            .await
            .map_err(|e| storage_error("failed to query recent memories", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch memory row", e))?
        {
            out.push(row_to_memory(&row, Tier::Project)?);
        }
        Ok(out)
    }

    async fn get_memories_since(&self, epoch_ms: i64) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE created_at >= ? ORDER BY created_at ASC"
        );
        let mut rows = conn
            .query(&sql, params![epoch_ms])
            .await
            .map_err(|e| storage_error("failed to query memories since", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch memory row", e))?
        {
            out.push(row_to_memory(&row, Tier::Project)?);
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
            out.push(row_to_memory(&row, Tier::Project)?);
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

    /// Coalesce every non-pinned memory older than `older_than_days` into
    /// one summary entry, then delete the originals (spec §4.3 "`summarize`
    /// rolls old low-traffic entries into a synthetic summary memory").
    async fn summarize(&self, older_than_days: f64, now_ms_value: i64) -> Result<SummarizeResult> {
        let conn = self.conn()?;
        let cutoff = now_ms_value - (older_than_days * 86_400_000.0) as i64;
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE updated_at < ? AND pinned = 0 \
             ORDER BY updated_at ASC"
        );
        let mut rows = conn
            .query(&sql, params![cutoff])
            .await
            .map_err(|e| storage_error("failed to query summarize candidates", e))?;
        let mut candidates = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch memory row", e))?
        {
            candidates.push(row_to_memory(&row, Tier::Project)?);
        }

        if candidates.is_empty() {
            return Ok(SummarizeResult {
                summary_id: String::new(),
                count: 0,
                summary_text: String::new(),
            });
        }

        let count = candidates.len();
        let mut summary_text = format!("Summary of {count} older memories:\n");
        for memory in &candidates {
            let title = memory
                .metadata
                .title
                .clone()
                .unwrap_or_else(|| memory.memory_type.as_str().to_string());
            let snippet: String = memory.content.chars().take(120).collect();
            summary_text.push_str(&format!("- [{title}] {snippet}\n"));
        }

        let summary = Memory::new(
            context_core::model::MemoryType::Legacy("summary".to_string()),
            Tier::Project,
            summary_text.clone(),
            context_core::model::Metadata::default(),
        );
        let summary_id = summary.id.clone();
        self.store(summary).await?;

        for memory in &candidates {
            self.delete(&memory.id).await?;
        }

        Ok(SummarizeResult {
            summary_id,
            count,
            summary_text,
        })
    }

    async fn get_last_seen(&self) -> Result<Option<ProjectMetaEntry>> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT value, updated_at FROM project_meta WHERE key = ?",
                params![LAST_SEEN_KEY.to_string()],
            )
            .await
            .map_err(|e| storage_error("failed to query last_seen", e))?;
        match rows
            .next()
            .await
            .map_err(|e| storage_error("failed to fetch last_seen row", e))?
        {
            Some(row) => {
                let value: String = row.get(0).map_err(|e| storage_error("column 'value'", e))?;
                let updated_at: i64 = row
                    .get(1)
                    .map_err(|e| storage_error("column 'updated_at'", e))?;
                Ok(Some(ProjectMetaEntry { value, updated_at }))
            }
            None => Ok(None),
        }
    }

    async fn update_last_seen(&self, epoch_ms: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO project_meta (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![LAST_SEEN_KEY.to_string(), epoch_ms.to_string(), epoch_ms],
        )
        .await
        .map_err(|e| storage_error("failed to update last_seen", e))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
