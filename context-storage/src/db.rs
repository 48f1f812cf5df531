//! Opens a libsql database file (creating parent directories as needed) and
//! applies the schema appropriate to its role. Every durable store here is
//! a single local file; there's no remote-connection or pooling machinery
//! to configure.

use std::path::Path;
use std::sync::Arc;

use libsql::{Builder, Database};

use context_core::error::Result;

use crate::error::storage_error;
use crate::{fts5_schema, schema};

async fn open(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| storage_error("failed to create storage directory", e))?;
    }
    Builder::new_local(path)
        .build()
        .await
        .map_err(|e| storage_error("failed to open database", e))
}

async fn run(conn: &libsql::Connection, sql: &str) -> Result<()> {
    conn.execute(sql, ())
        .await
        .map_err(|e| storage_error("schema statement failed", e))?;
    Ok(())
}

/// Open (creating if absent) the `memories` schema used by both tier 2 and
/// tier 3: identical table shape, identical FTS5 shadow.
pub async fn open_memories_db(path: &Path) -> Result<Arc<Database>> {
    let db = open(path).await?;
    let conn = db
        .connect()
        .map_err(|e| storage_error("failed to open connection", e))?;
    run(&conn, schema::CREATE_MEMORIES_TABLE).await?;
    run(&conn, schema::CREATE_MEMORIES_UPDATED_AT_INDEX).await?;
    run(&conn, schema::CREATE_MEMORIES_TYPE_INDEX).await?;
    run(&conn, schema::CREATE_MEMORIES_PROJECT_PATH_INDEX).await?;
    run(&conn, schema::CREATE_PROJECT_META_TABLE).await?;
    run(&conn, fts5_schema::CREATE_MEMORIES_FTS_TABLE).await?;
    run(&conn, fts5_schema::CREATE_MEMORIES_FTS_TRIGGERS).await?;
    Ok(Arc::new(db))
}

/// Open (creating if absent) the per-project code-index schema.
pub async fn open_code_index_db(path: &Path) -> Result<Arc<Database>> {
    let db = open(path).await?;
    let conn = db
        .connect()
        .map_err(|e| storage_error("failed to open connection", e))?;
    run(&conn, schema::CREATE_CODE_FILES_TABLE).await?;
    run(&conn, schema::CREATE_CODE_CHUNKS_TABLE).await?;
    run(&conn, schema::CREATE_CODE_CHUNKS_FILE_INDEX).await?;
    run(&conn, schema::CREATE_CODE_SYMBOLS_TABLE).await?;
    run(&conn, schema::CREATE_CODE_SYMBOLS_FILE_INDEX).await?;
    run(&conn, schema::CREATE_CODE_SYMBOLS_NAME_INDEX).await?;
    run(&conn, fts5_schema::CREATE_CODE_CHUNKS_FTS_TABLE).await?;
    run(&conn, fts5_schema::CREATE_CODE_CHUNKS_FTS_TRIGGERS).await?;
    Ok(Arc::new(db))
}
