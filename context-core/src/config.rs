//! Typed configuration, loaded from a YAML file plus environment overrides.
//! Every field carries a default so a partial or absent file still yields
//! the documented behavior.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Root configuration for the engine, mirroring the `storage`, `ttl`,
/// `embedding`, `context`, and `codeIndex` sections of the YAML config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    pub storage: StorageConfig,
    pub ttl: TtlConfig,
    pub embedding: EmbeddingConfig,
    pub context: ContextConfig,
    pub code_index: CodeIndexConfig,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            ttl: TtlConfig::default(),
            embedding: EmbeddingConfig::default(),
            context: ContextConfig::default(),
            code_index: CodeIndexConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for persistent state. Resolution order:
    /// `CONTEXT_FABRIC_DIR` env var, else `$HOME/.context-fabric`.
    pub root_dir: PathBuf,
    /// Size of the durable-tier connection pool used for concurrent reads.
    pub max_connections: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Default tier-1 ttl in seconds when a caller omits one.
    pub l1_default_ttl_seconds: u64,
    /// Tier-1 capacity; LRU-evicted beyond this.
    pub l1_capacity: usize,
    /// Tier-1 expiry sweep interval in seconds.
    pub l1_cleanup_interval_seconds: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            l1_default_ttl_seconds: 3600,
            l1_capacity: 1000,
            l1_cleanup_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub dimension: usize,
    pub cache_capacity: usize,
    pub deadline_seconds: u64,
    /// Overrides the default local model cache directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: crate::model::EMBEDDING_DIM,
            cache_capacity: 10_000,
            deadline_seconds: 30,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Decay half-life in days, configurable rather than fixed.
    pub decay_days: f64,
    /// Relevance-score threshold below which decay deletes an entry.
    pub decay_threshold: f64,
    /// Decay background task period, in seconds (default 1h).
    pub decay_period_seconds: u64,
    /// `getContextWindow` tunables.
    pub max_working_memories: usize,
    pub max_relevant_memories: usize,
    pub max_patterns: usize,
    pub max_ghost_messages: usize,
    pub max_suggestions: usize,
    /// `recall` defaults.
    pub default_recall_limit: usize,
    pub default_recall_threshold: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            decay_days: 14.0,
            decay_threshold: 0.2,
            decay_period_seconds: 3600,
            max_working_memories: 10,
            max_relevant_memories: 10,
            max_patterns: 5,
            max_ghost_messages: 5,
            max_suggestions: 5,
            default_recall_limit: 10,
            default_recall_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeIndexConfig {
    pub max_file_size_bytes: u64,
    pub max_files: usize,
    pub chunk_lines: usize,
    pub chunk_overlap: usize,
    pub debounce_ms: u64,
    pub semantic_threshold: f64,
    pub exclude_globs: Vec<String>,
}

impl Default for CodeIndexConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1024 * 1024,
            max_files: 10_000,
            chunk_lines: 150,
            chunk_overlap: 10,
            debounce_ms: 500,
            semantic_threshold: 0.5,
            exclude_globs: vec![
                "**/.git/**".into(),
                "**/node_modules/**".into(),
                "**/target/**".into(),
                "**/dist/**".into(),
                "**/.venv/**".into(),
            ],
        }
    }
}

fn default_root_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CONTEXT_FABRIC_DIR") {
        return PathBuf::from(dir);
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".context-fabric"))
        .unwrap_or_else(|| PathBuf::from(".context-fabric"))
}

impl FabricConfig {
    /// Load from a YAML file at `path`, falling back to defaults for any
    /// section or field the file omits, then applying the recognized
    /// environment variable overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&text).unwrap_or_default()
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `L1_DEFAULT_TTL` and `L3_DECAY_DAYS` overrides. Unparseable
    /// values are ignored rather than failing startup.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("L1_DEFAULT_TTL") {
            if let Ok(secs) = v.parse() {
                self.ttl.l1_default_ttl_seconds = secs;
            }
        }
        if let Ok(v) = std::env::var("L3_DECAY_DAYS") {
            if let Ok(days) = v.parse() {
                self.context.decay_days = days;
            }
        }
        if let Ok(dir) = std::env::var("CONTEXT_FABRIC_DIR") {
            self.storage.root_dir = PathBuf::from(dir);
        }
    }

    pub fn project_db_path(&self, project_path: &str) -> PathBuf {
        self.storage
            .root_dir
            .join("projects")
            .join(project_slug(project_path))
            .join("project.db")
    }

    pub fn semantic_db_path(&self) -> PathBuf {
        self.storage.root_dir.join("semantic").join("semantic.db")
    }

    pub fn code_index_db_path(&self, project_path: &str) -> PathBuf {
        self.storage
            .root_dir
            .join("projects")
            .join(project_slug(project_path))
            .join("code-index.db")
    }
}

/// Turn an absolute project path into a filesystem-safe directory name.
fn project_slug(project_path: &str) -> String {
    project_path
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_documented_values() {
        let c = FabricConfig::default();
        assert_eq!(c.ttl.l1_capacity, 1000);
        assert_eq!(c.ttl.l1_default_ttl_seconds, 3600);
        assert_eq!(c.context.decay_days, 14.0);
        assert_eq!(c.context.decay_threshold, 0.2);
        assert_eq!(c.embedding.dimension, 384);
        assert_eq!(c.embedding.cache_capacity, 10_000);
        assert_eq!(c.code_index.chunk_lines, 150);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let c = FabricConfig::load(Path::new("/nonexistent/path.yaml")).unwrap();
        assert_eq!(c.ttl.l1_capacity, 1000);
    }

    #[test]
    fn project_slug_is_filesystem_safe() {
        let slug = project_slug("/home/user/my project!");
        assert!(!slug.contains('/'));
        assert!(!slug.contains(' '));
    }
}
