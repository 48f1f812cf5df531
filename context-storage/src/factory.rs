//! `StorageFactory` wiring: turns a [`FabricConfig`]'s path helpers into
//! opened libsql-backed stores. One instance lives in the process; the
//! engine registry calls `open_tier2`/`open_code_index_store` once per
//! project path and `open_tier3` once at startup.

use std::sync::Arc;

use async_trait::async_trait;
use libsql::Database;
use tokio::sync::Mutex;

use context_core::config::FabricConfig;
use context_core::error::Result;
use context_core::traits::{CodeIndexStore, StorageFactory, Tier2Store, Tier3Store};

use crate::code_index::LibsqlCodeIndexStore;
use crate::db::{open_code_index_db, open_memories_db};
use crate::tier2::LibsqlTier2Store;
use crate::tier3::LibsqlTier3Store;

/// Opens and caches the durable-tier databases named by a [`FabricConfig`].
/// The tier-3 database is process-global and opened at most once; tier-2
/// and code-index databases are cached per project path so repeated
/// `engine_for` calls against the same project reuse the same connection
/// pool instead of reopening the file.
pub struct LibsqlStorageFactory {
    config: FabricConfig,
    tier3: Mutex<Option<Arc<Database>>>,
}

impl LibsqlStorageFactory {
    pub fn new(config: FabricConfig) -> Self {
        Self {
            config,
            tier3: Mutex::new(None),
        }
    }
}

#[async_trait]
impl StorageFactory for LibsqlStorageFactory {
    async fn open_tier2(&self, project_path: &str) -> Result<Arc<dyn Tier2Store>> {
        let path = self.config.project_db_path(project_path);
        let db = open_memories_db(&path).await?;
        Ok(Arc::new(LibsqlTier2Store::new(db)))
    }

    async fn open_tier3(&self) -> Result<Arc<dyn Tier3Store>> {
        let mut guard = self.tier3.lock().await;
        let db = match guard.as_ref() {
            Some(db) => db.clone(),
            None => {
                let db = open_memories_db(&self.config.semantic_db_path()).await?;
                *guard = Some(db.clone());
                db
            }
        };
        Ok(Arc::new(LibsqlTier3Store::new(db)))
    }

    async fn open_code_index_store(
        &self,
        project_path: &str,
    ) -> Result<Arc<dyn CodeIndexStore>> {
        let path = self.config.code_index_db_path(project_path);
        let db = open_code_index_db(&path).await?;
        Ok(Arc::new(LibsqlCodeIndexStore::new(db)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> FabricConfig {
        let mut config = FabricConfig::default();
        config.storage.root_dir = dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn open_tier2_creates_one_database_per_project() {
        let dir = TempDir::new().unwrap();
        let factory = LibsqlStorageFactory::new(config_in(&dir));

        let a = factory.open_tier2("/projects/a").await.unwrap();
        let b = factory.open_tier2("/projects/b").await.unwrap();

        assert_eq!(a.count().await.unwrap(), 0);
        assert_eq!(b.count().await.unwrap(), 0);
        assert!(dir.path().join("projects").exists());
    }

    #[tokio::test]
    async fn open_tier3_reuses_the_cached_database_handle() {
        let dir = TempDir::new().unwrap();
        let factory = LibsqlStorageFactory::new(config_in(&dir));

        let first = factory.open_tier3().await.unwrap();
        let second = factory.open_tier3().await.unwrap();

        assert_eq!(first.count().await.unwrap(), second.count().await.unwrap());
        assert!(dir.path().join("semantic").join("semantic.db").exists());
    }

    #[tokio::test]
    async fn open_code_index_store_creates_a_project_scoped_database() {
        let dir = TempDir::new().unwrap();
        let factory = LibsqlStorageFactory::new(config_in(&dir));

        let store = factory.open_code_index_store("/projects/a").await.unwrap();
        let status = store.status().await.unwrap();
        assert_eq!(status.total_files, 0);
    }
}
