//! The per-project code index: walk, chunk, extract symbols, and serve
//! text/symbol/semantic search over a project's source tree (spec §4.8).
//!
//! Built lazily (first `searchCode` call or the first `orient`) and kept
//! fresh by incremental re-scan: file mtimes are compared against what the
//! backing [`CodeIndexStore`] last recorded, so unchanged files are never
//! re-chunked or re-embedded.

pub mod extractor;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobSetBuilder};
use tokio::sync::Mutex as AsyncMutex;
use walkdir::WalkDir;

use crate::api::{CodeIndexStatus, CodeSearchHit, CodeSearchMode, CodeSearchOptions, CodeSearchResult};
use crate::config::CodeIndexConfig;
use crate::embedding::EmbeddingService;
use crate::error::Result;
use crate::model::CodeChunk;
use crate::traits::CodeIndexStore;

pub use extractor::{language_from_extension, language_tier, ExtractedSymbol, RegexSymbolExtractor, SymbolExtractor};

/// A lazily-built, incrementally-refreshed index over one project's files.
pub struct CodeIndex {
    root_dir: PathBuf,
    config: CodeIndexConfig,
    extractor: Arc<dyn SymbolExtractor>,
    embedder: Option<Arc<EmbeddingService>>,
    store: Arc<dyn CodeIndexStore>,
    /// Serializes refresh passes; a `searchCode` call never blocks behind
    /// one beyond waiting for it to finish (spec §5 "reads may proceed
    /// concurrently" doesn't apply to the index's own write path, which is
    /// a single background-ish job rather than a per-tier store).
    refresh_lock: AsyncMutex<()>,
    last_indexed_at: AtomicI64,
}

impl CodeIndex {
    pub fn new(
        root_dir: PathBuf,
        config: CodeIndexConfig,
        extractor: Arc<dyn SymbolExtractor>,
        embedder: Option<Arc<EmbeddingService>>,
        store: Arc<dyn CodeIndexStore>,
    ) -> Self {
        Self {
            root_dir,
            config,
            extractor,
            embedder,
            store,
            refresh_lock: AsyncMutex::new(()),
            last_indexed_at: AtomicI64::new(0),
        }
    }

    /// Walk the project tree and bring the backing store up to date.
    /// Unchanged files (same mtime as last recorded) are skipped entirely;
    /// files present in the store but no longer on disk are dropped.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let exclude = build_exclude_set(&self.config.exclude_globs);
        let discovered = discover_files(&self.root_dir, &exclude, self.config.max_file_size_bytes, self.config.max_files);

        let known = self.store.all_files().await?;
        let discovered_paths: std::collections::HashSet<&str> =
            discovered.iter().map(|f| f.rel_path.as_str()).collect();
        for (path, _) in known.iter() {
            if !discovered_paths.contains(path.as_str()) {
                self.store.remove_file(path).await?;
            }
        }
        let known_mtimes: std::collections::HashMap<&str, i64> =
            known.iter().map(|(p, m)| (p.as_str(), *m)).collect();

        for file in &discovered {
            if known_mtimes.get(file.rel_path.as_str()) == Some(&file.mtime_ms) {
                continue;
            }
            self.index_file(file).await?;
        }

        self.last_indexed_at.store(crate::model::now_ms(), Ordering::SeqCst);
        Ok(())
    }

    async fn index_file(&self, file: &DiscoveredFile) -> Result<()> {
        let Ok(content) = std::fs::read_to_string(&file.abs_path) else {
            // Unreadable or non-UTF8; drop whatever we had and move on
            // rather than fail the whole refresh over one file.
            self.store.remove_file(&file.rel_path).await?;
            return Ok(());
        };

        let chunks = chunk_lines(&content, self.config.chunk_lines, self.config.chunk_overlap);
        let mut code_chunks = Vec::with_capacity(chunks.len());
        for (start, end, text) in chunks {
            let embedding = match &self.embedder {
                Some(embedder) => embedder.embed(&text).await.ok(),
                None => None,
            };
            code_chunks.push(CodeChunk {
                file_path: file.rel_path.clone(),
                language: file.language.to_string(),
                start_line: start,
                end_line: end,
                content: text,
                embedding,
            });
        }

        let symbols = self
            .extractor
            .extract(&content, file.language)
            .into_iter()
            .map(|s| crate::model::CodeSymbol {
                file_path: file.rel_path.clone(),
                name: s.name,
                kind: s.kind,
                signature: s.signature,
                start_line: s.start_line,
                end_line: s.end_line,
                doc_comment: s.doc_comment,
            })
            .collect();

        self.store.upsert_file(&file.rel_path, file.language, file.mtime_ms).await?;
        self.store.replace_chunks(&file.rel_path, code_chunks).await?;
        self.store.replace_symbols(&file.rel_path, symbols).await?;
        Ok(())
    }

    /// `totalFiles`/`totalSymbols`/`lastIndexedAt` from the store, plus
    /// `isStale`: whether the tree has changed since the last refresh.
    pub async fn status(&self) -> Result<CodeIndexStatus> {
        let mut status = self.store.status().await?;
        status.last_indexed_at = match self.last_indexed_at.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(ms),
        };
        status.is_stale = self.is_stale().await?;
        Ok(status)
    }

    /// A cheap mtime-only pass: no chunking or embedding, just "does
    /// anything on disk disagree with what the store last recorded".
    async fn is_stale(&self) -> Result<bool> {
        if self.last_indexed_at.load(Ordering::SeqCst) == 0 {
            return Ok(true);
        }
        let exclude = build_exclude_set(&self.config.exclude_globs);
        let discovered = discover_files(&self.root_dir, &exclude, self.config.max_file_size_bytes, self.config.max_files);
        let known = self.store.all_files().await?;
        if known.len() != discovered.len() {
            return Ok(true);
        }
        let known_mtimes: std::collections::HashMap<&str, i64> =
            known.iter().map(|(p, m)| (p.as_str(), *m)).collect();
        Ok(discovered
            .iter()
            .any(|f| known_mtimes.get(f.rel_path.as_str()) != Some(&f.mtime_ms)))
    }

    pub async fn search(&self, query: &str, opts: &CodeSearchOptions) -> Result<CodeSearchResult> {
        let hits = match opts.mode {
            CodeSearchMode::Text => self.search_text(query, opts).await?,
            CodeSearchMode::Symbol => self.search_symbol(query, opts).await?,
            CodeSearchMode::Semantic => self.search_semantic(query, opts).await?,
        };
        let index_status = self.status().await?;
        let total = hits.len();
        Ok(CodeSearchResult { results: hits, index_status, total })
    }

    async fn search_text(&self, query: &str, opts: &CodeSearchOptions) -> Result<Vec<CodeSearchHit>> {
        let over_fetch = opts.limit.max(1) * 2;
        let chunks = self.store.search_text(query, over_fetch).await?;
        let pattern = build_file_pattern(opts.file_pattern.as_deref());
        Ok(chunks
            .into_iter()
            .filter(|c| matches_filters(c.file_path.as_str(), &c.language, opts, pattern.as_ref()))
            .take(opts.limit.max(1))
            .map(|c| CodeSearchHit {
                file_path: c.file_path,
                language: c.language,
                start_line: c.start_line,
                end_line: c.end_line,
                score: 1.0,
                content: opts.include_content.then_some(c.content),
                symbol_name: None,
            })
            .collect())
    }

    async fn search_symbol(&self, query: &str, opts: &CodeSearchOptions) -> Result<Vec<CodeSearchHit>> {
        let symbols = self
            .store
            .search_symbol(query, opts.symbol_kind, opts.language.as_deref(), opts.limit.max(1))
            .await?;
        let pattern = build_file_pattern(opts.file_pattern.as_deref());
        Ok(symbols
            .into_iter()
            .filter(|s| matches_file_pattern(&s.file_path, pattern.as_ref()))
            .map(|s| CodeSearchHit {
                file_path: s.file_path,
                language: String::new(),
                start_line: s.start_line,
                end_line: s.end_line,
                score: 1.0,
                content: opts.include_content.then_some(s.signature.clone()),
                symbol_name: Some(s.name),
            })
            .collect())
    }

    async fn search_semantic(&self, query: &str, opts: &CodeSearchOptions) -> Result<Vec<CodeSearchHit>> {
        let Some(embedder) = &self.embedder else {
            return Ok(Vec::new());
        };
        let query_embedding = embedder.embed(query).await?;
        let hits = self.store.search_semantic(&query_embedding, opts.limit.max(1) * 2).await?;
        let pattern = build_file_pattern(opts.file_pattern.as_deref());
        Ok(hits
            .into_iter()
            .filter(|(c, score)| *score >= opts.threshold && matches_filters(&c.file_path, &c.language, opts, pattern.as_ref()))
            .take(opts.limit.max(1))
            .map(|(c, score)| CodeSearchHit {
                file_path: c.file_path,
                language: c.language,
                start_line: c.start_line,
                end_line: c.end_line,
                score,
                content: opts.include_content.then_some(c.content),
                symbol_name: None,
            })
            .collect())
    }
}

fn matches_filters(file_path: &str, language: &str, opts: &CodeSearchOptions, pattern: Option<&globset::GlobMatcher>) -> bool {
    if let Some(want) = &opts.language {
        if !language.eq_ignore_ascii_case(want) {
            return false;
        }
    }
    matches_file_pattern(file_path, pattern)
}

fn matches_file_pattern(file_path: &str, pattern: Option<&globset::GlobMatcher>) -> bool {
    match pattern {
        Some(p) => p.is_match(file_path),
        None => true,
    }
}

fn build_file_pattern(glob: Option<&str>) -> Option<globset::GlobMatcher> {
    glob.and_then(|g| Glob::new(g).ok()).map(|g| g.compile_matcher())
}

struct DiscoveredFile {
    abs_path: PathBuf,
    rel_path: String,
    language: &'static str,
    mtime_ms: i64,
}

fn build_exclude_set(globs: &[String]) -> globset::GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().expect("empty globset always builds"))
}

/// Walk `root`, applying the exclude globs, size cap, and file cap from
/// config. Every non-excluded file under the cap is discovered, whether or
/// not its language has symbol support (spec §4.8 "other languages: chunks
/// only").
fn discover_files(root: &Path, exclude: &globset::GlobSet, max_file_size_bytes: u64, max_files: usize) -> Vec<DiscoveredFile> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if out.len() >= max_files {
            break;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let abs_path = entry.path().to_path_buf();
        let rel_path = match abs_path.strip_prefix(root) {
            Ok(p) => p.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        if exclude.is_match(&rel_path) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        if metadata.len() > max_file_size_bytes {
            continue;
        }
        let language = abs_path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(language_from_extension)
            .unwrap_or("text");
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        out.push(DiscoveredFile { abs_path, rel_path, language, mtime_ms });
    }
    out
}

/// Split `content` into `chunk_lines`-sized windows overlapping by
/// `chunk_overlap` lines (spec §4.8). A file shorter than one window
/// yields a single chunk covering it in full.
fn chunk_lines(content: &str, chunk_lines: usize, chunk_overlap: usize) -> Vec<(u32, u32, String)> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }
    let chunk_lines = chunk_lines.max(1);
    let step = chunk_lines.saturating_sub(chunk_overlap).max(1);

    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_lines).min(lines.len());
        let text = lines[start..end].join("\n");
        out.push((start as u32 + 1, end as u32, text));
        if end >= lines.len() {
            break;
        }
        start += step;
    }
    out
}

/// Spawn a debounced `notify` watcher that calls [`CodeIndex::refresh`]
/// after activity settles for `debounce_ms` (spec §5 "a single
/// file-watcher per code index (optional)"). Errors setting up the OS
/// watcher are logged and swallowed; `orient`'s own on-demand refresh is
/// the guaranteed fallback (spec §4.8).
pub fn watch(index: Arc<CodeIndex>) -> Option<notify::RecommendedWatcher> {
    use notify::{Event, RecursiveMode, Watcher};

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let mut watcher = match notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    }) {
        Ok(w) => w,
        Err(error) => {
            tracing::warn!(%error, "failed to start code index file watcher");
            return None;
        }
    };
    if let Err(error) = watcher.watch(&index.root_dir, RecursiveMode::Recursive) {
        tracing::warn!(%error, "failed to watch project root");
        return None;
    }

    let debounce = Duration::from_millis(index.config.debounce_ms.max(1));
    tokio::spawn(async move {
        loop {
            let Some(_first) = rx.recv().await else { break };
            loop {
                match tokio::time::timeout(debounce, rx.recv()).await {
                    Ok(Some(_)) => continue,
                    Ok(None) => return,
                    Err(_) => break,
                }
            }
            if let Err(error) = index.refresh().await {
                tracing::warn!(%error, "debounced code index refresh failed");
            }
        }
    });

    Some(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_splits_with_overlap() {
        let content = (1..=10).map(|n| format!("line{n}")).collect::<Vec<_>>().join("\n");
        let chunks = chunk_lines(&content, 4, 1);
        assert_eq!(chunks[0], (1, 4, "line1\nline2\nline3\nline4".to_string()));
        assert_eq!(chunks[1].0, 4);
    }

    #[test]
    fn short_file_yields_single_chunk() {
        let chunks = chunk_lines("a\nb\n", 150, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], (1, 2, "a\nb".to_string()));
    }

    #[test]
    fn empty_file_yields_no_chunks() {
        assert!(chunk_lines("", 150, 10).is_empty());
    }

    #[test]
    fn exclude_globs_filter_discovery() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/x.js"), "const x = 1;").unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        let exclude = build_exclude_set(&["**/node_modules/**".to_string()]);
        let files = discover_files(dir.path(), &exclude, 1024 * 1024, 10_000);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "main.rs");
    }
}
