//! The `ContextEngine` facade (spec §4.9): the single entry point wiring the
//! router, the three tiers, the hybrid recall pipeline, the decay
//! scheduler, and the code index together.
//!
//! One [`ContextEngine`] per project path; the tier-3 store and embedding
//! service are process-global and shared across every engine. Engines are
//! never constructed directly — [`EngineRegistry`] owns the project-path
//! map and the shared resources (spec §9 "per-project engine instance
//! map").

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tokio::task::JoinHandle;

use crate::api::{
    is_decision_or_bugfix, CodeSearchOptions, CodeSearchResult, ContextWindow,
    ContextWindowPrefs, ListOptions, ListResult, OfflineGap, OrientResult, PromoteResult,
    RecallOptions, RecallResult, ScoredMemory, StoreOptions, StoreResult, SummarizeOutcome,
    TierStats, TimeAnchor, UpdateRequest,
};
use crate::code_index::{CodeIndex, RegexSymbolExtractor, SymbolExtractor};
use crate::config::FabricConfig;
use crate::decay::DecayScheduler;
use crate::embedding::EmbeddingService;
use crate::error::{Error, Result};
use crate::hybrid;
use crate::model::{now_ms, Memory, MemoryType, Metadata, Source, Tier};
use crate::router;
use crate::tier1::Tier1Store;
use crate::traits::{CodeIndexStore, ListFilter, StorageFactory, Tier2Store, Tier3Store};

/// Owns the shared, process-global resources and the project-path → engine
/// map. The only supported way to obtain a [`ContextEngine`].
pub struct EngineRegistry {
    factory: Arc<dyn StorageFactory>,
    config: FabricConfig,
    tier3: Arc<dyn Tier3Store>,
    embedder: Arc<EmbeddingService>,
    decay: SyncMutex<Option<DecayScheduler>>,
    engines: AsyncMutex<HashMap<String, Arc<ContextEngine>>>,
}

impl EngineRegistry {
    /// Opens the shared tier-3 store and starts the periodic decay task.
    /// Per-project resources are opened lazily in [`Self::engine_for`].
    pub async fn new(config: FabricConfig, factory: Arc<dyn StorageFactory>) -> Result<Self> {
        let tier3 = factory.open_tier3().await?;
        let embedder = Arc::new(EmbeddingService::new(&config.embedding));
        let decay = DecayScheduler::start(
            tier3.clone(),
            config.context.decay_days,
            config.context.decay_threshold,
            Duration::from_secs(config.context.decay_period_seconds.max(1)),
        );
        Ok(Self {
            factory,
            config,
            tier3,
            embedder,
            decay: SyncMutex::new(Some(decay)),
            engines: AsyncMutex::new(HashMap::new()),
        })
    }

    /// Returns the engine for `project_path`, opening its tier-2 and
    /// code-index stores on first use. Insertion is single-flight: the lock
    /// is held across the (one-time) open, so a second caller racing on the
    /// same never-seen path waits for the first rather than opening twice.
    pub async fn engine_for(&self, project_path: &str) -> Result<Arc<ContextEngine>> {
        let canonical = canonicalize_project_path(project_path);
        let mut engines = self.engines.lock().await;
        if let Some(existing) = engines.get(&canonical) {
            return Ok(existing.clone());
        }
        let tier2 = self.factory.open_tier2(&canonical).await?;
        let code_index_store = self.factory.open_code_index_store(&canonical).await?;
        let engine = Arc::new(ContextEngine::new(
            canonical.clone(),
            self.config.clone(),
            tier2,
            self.tier3.clone(),
            self.embedder.clone(),
            code_index_store,
        ));
        engine.clone().spawn_housekeeping();
        engines.insert(canonical, engine.clone());
        Ok(engine)
    }

    /// Aborts the decay task, closes every open engine's store handles, and
    /// closes the shared tier-3 store (spec §5 "Shutdown").
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(mut decay) = self.decay.lock().take() {
            decay.shutdown();
        }
        let engines = self.engines.lock().await;
        for engine in engines.values() {
            engine.close().await?;
        }
        self.tier3.close().await
    }
}

fn canonicalize_project_path(project_path: &str) -> String {
    std::fs::canonicalize(project_path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| project_path.to_string())
}

/// The per-project facade: everything a caller (the RPC layer, in
/// production) needs to store, recall, and browse memories, and to search
/// the project's source tree.
pub struct ContextEngine {
    project_path: String,
    config: FabricConfig,
    tier1: Tier1Store,
    tier2: Arc<dyn Tier2Store>,
    tier3: Arc<dyn Tier3Store>,
    embedder: Arc<EmbeddingService>,
    code_index_store: Arc<dyn CodeIndexStore>,
    code_index: OnceCell<Arc<CodeIndex>>,
    housekeeping: SyncMutex<Option<JoinHandle<()>>>,
}

impl ContextEngine {
    fn new(
        project_path: String,
        config: FabricConfig,
        tier2: Arc<dyn Tier2Store>,
        tier3: Arc<dyn Tier3Store>,
        embedder: Arc<EmbeddingService>,
        code_index_store: Arc<dyn CodeIndexStore>,
    ) -> Self {
        let tier1 = Tier1Store::new(config.ttl.l1_capacity, config.ttl.l1_default_ttl_seconds);
        Self {
            project_path,
            tier1,
            tier2,
            tier3,
            embedder,
            code_index_store,
            code_index: OnceCell::new(),
            config,
            housekeeping: SyncMutex::new(None),
        }
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    /// `store` (spec §4.9): route, fill defaults, place.
    pub async fn store(
        &self,
        content: String,
        memory_type: &str,
        mut opts: StoreOptions,
    ) -> Result<StoreResult> {
        if content.trim().is_empty() {
            return Err(Error::InvalidInput("content must not be empty".into()));
        }
        fill_store_defaults(&mut opts.metadata, &self.project_path);

        let memory_type = MemoryType::parse(memory_type);
        let decision = router::route(
            &memory_type,
            &opts.metadata.tags,
            opts.ttl,
            opts.layer,
            &content,
        );
        let mut memory = Memory::new(memory_type, decision.tier, content, opts.metadata);
        memory.pinned = opts.pinned.unwrap_or(false);

        let stored = match decision.tier {
            Tier::Working => self.tier1.store(memory, opts.ttl),
            Tier::Project => self.tier2.store(memory).await?,
            Tier::Semantic => self.store_tier3(memory).await?,
        };

        Ok(StoreResult {
            id: stored.id,
            success: true,
            layer: stored.tier.as_u8(),
            pinned: stored.pinned,
        })
    }

    async fn store_tier3(&self, mut memory: Memory) -> Result<Memory> {
        let embedding = self.embedder.embed(&memory.content).await?;
        memory.embedding = Some(embedding);
        memory.relevance_score = Some(1.0);
        self.tier3.store(memory).await
    }

    /// `recall` (spec §4.6).
    pub async fn recall(&self, query: &str, opts: RecallOptions) -> Result<RecallResult> {
        hybrid::recall(&self.tier1, &*self.tier2, &*self.tier3, &self.embedder, query, &opts).await
    }

    /// `get` (spec §4.9): L1 → L2 → L3, first hit wins.
    pub async fn get(&self, id: &str) -> Result<Memory> {
        if let Some(memory) = self.tier1.get(id) {
            return Ok(memory);
        }
        if let Some(mut memory) = self.tier2.get(id).await? {
            memory.touch();
            self.tier2.put(&memory).await?;
            return Ok(memory);
        }
        if let Some(mut memory) = self.tier3.get(id).await? {
            memory.touch();
            self.tier3.put(&memory).await?;
            return Ok(memory);
        }
        Err(Error::NotFound(id.to_string()))
    }

    /// `update` (spec §4.9): tier 1 is immutable; `targetTier` greater than
    /// the current tier triggers a one-step promotion.
    pub async fn update(&self, id: &str, req: UpdateRequest) -> Result<()> {
        if self.tier1.get(id).is_some() {
            return Err(Error::ImmutableTier(format!(
                "memory {id} lives in tier 1, which cannot be mutated in place"
            )));
        }

        if let Some(mut memory) = self.tier2.get(id).await? {
            let content_changed = apply_update(&mut memory, &req);
            let _ = content_changed; // tier 2 never carries an embedding to refresh
            self.tier2.put(&memory).await?;
            return self.maybe_promote_after_update(id, Tier::Project, req.target_tier).await;
        }

        if let Some(mut memory) = self.tier3.get(id).await? {
            let content_changed = apply_update(&mut memory, &req);
            if content_changed {
                memory.embedding = Some(self.embedder.embed(&memory.content).await?);
            }
            self.tier3.put(&memory).await?;
            return self.maybe_promote_after_update(id, Tier::Semantic, req.target_tier).await;
        }

        Err(Error::NotFound(id.to_string()))
    }

    async fn maybe_promote_after_update(
        &self,
        id: &str,
        current: Tier,
        target: Option<Tier>,
    ) -> Result<()> {
        let Some(target) = target else { return Ok(()) };
        if target.as_u8() <= current.as_u8() {
            return Ok(());
        }
        if target.as_u8() != current.as_u8() + 1 {
            return Err(Error::InvalidPromotion(
                "promotion may only advance one tier at a time".into(),
            ));
        }
        self.promote(id, current).await.map(|_| ())
    }

    /// `delete` (spec §4.9): locate across tiers and remove.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        if self.tier1.delete(id) {
            return Ok(true);
        }
        if self.tier2.delete(id).await? {
            return Ok(true);
        }
        if self.tier3.delete(id).await? {
            return Ok(true);
        }
        Err(Error::NotFound(id.to_string()))
    }

    /// `list` (spec §4.9). With no `tier` filter, entries from all three
    /// tiers are merged and sorted by `updatedAt` descending before paging.
    pub async fn list(&self, opts: ListOptions) -> Result<ListResult> {
        let include = |t: Tier| opts.tier.is_none_or(|want| want as u8 == t as u8);
        let mut memories = Vec::new();

        if include(Tier::Working) {
            memories.extend(
                self.tier1
                    .get_all()
                    .into_iter()
                    .filter(|m| matches_list_filter(m, &opts)),
            );
        }
        if include(Tier::Project) {
            memories.extend(self.tier2.list(&to_list_filter(&opts, Some(&self.project_path))).await?);
        }
        if include(Tier::Semantic) {
            memories.extend(
                self.tier3
                    .list(&to_list_filter(&opts, None))
                    .await?
                    .into_iter()
                    .filter(|m| {
                        opts.tier.is_some()
                            || m.metadata.project_path.as_deref() == Some(self.project_path.as_str())
                    }),
            );
        }

        memories.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let limit = if opts.limit == 0 { memories.len() } else { opts.limit };
        let memories: Vec<Memory> = memories.into_iter().skip(opts.offset).take(limit).collect();

        let stats = if opts.stats { Some(self.tier_stats().await?) } else { None };
        Ok(ListResult { memories, stats })
    }

    async fn tier_stats(&self) -> Result<TierStats> {
        let tier1_all = self.tier1.get_all();
        Ok(TierStats {
            tier1: tier1_all.len(),
            tier1_pinned: tier1_all.iter().filter(|m| m.pinned).count(),
            tier2: self.tier2.count().await?,
            tier2_pinned: self.tier2.count_pinned().await?,
            tier3: self.tier3.count().await?,
            tier3_pinned: self.tier3.count_pinned().await?,
        })
    }

    /// `promote` (spec §4.9): copy up one tier with a fresh id, delete from
    /// source. Not a distributed transaction: the target write commits
    /// first, so a source-delete failure after a successful target write is
    /// logged rather than rolled back (see DESIGN.md).
    pub async fn promote(&self, id: &str, from_tier: Tier) -> Result<PromoteResult> {
        let Some(target_tier) = from_tier.next() else {
            return Err(Error::InvalidPromotion("tier 3 is already terminal".into()));
        };

        let source = match from_tier {
            Tier::Working => self.tier1.get(id),
            Tier::Project => self.tier2.get(id).await?,
            Tier::Semantic => None,
        };
        let Some(mut memory) = source else {
            return Err(Error::NotFound(id.to_string()));
        };

        memory.id = uuid::Uuid::new_v4().to_string();
        memory.tier = target_tier;
        memory.updated_at = now_ms();
        if target_tier == Tier::Semantic {
            memory.embedding = Some(self.embedder.embed(&memory.content).await?);
            memory.relevance_score = Some(1.0);
        }

        let stored = match target_tier {
            Tier::Project => self.tier2.store(memory).await?,
            Tier::Semantic => self.tier3.store(memory).await?,
            Tier::Working => unreachable!("promotion never targets tier 1"),
        };

        match from_tier {
            Tier::Working => {
                self.tier1.delete(id);
            }
            Tier::Project => {
                if let Err(error) = self.tier2.delete(id).await {
                    tracing::warn!(%error, id, "failed to remove source entry after promotion");
                }
            }
            Tier::Semantic => {}
        }

        Ok(PromoteResult { new_id: stored.id, new_tier: target_tier })
    }

    /// `summarize` (spec §4.9): tier 2 coalesces old entries; tier 3 runs a
    /// decay pass and reports deletions. Tier 1 is rejected.
    pub async fn summarize(&self, tier: Tier, older_than_days: f64) -> Result<SummarizeOutcome> {
        match tier {
            Tier::Working => Err(Error::ImmutableTier(
                "tier 1 has no durable history to summarize".into(),
            )),
            Tier::Project => {
                let result = self.tier2.summarize(older_than_days, now_ms()).await?;
                Ok(SummarizeOutcome {
                    summary_id: Some(result.summary_id),
                    count: result.count,
                    deleted: result.count,
                })
            }
            Tier::Semantic => {
                let deleted = self
                    .tier3
                    .apply_decay(
                        self.config.context.decay_days,
                        self.config.context.decay_threshold,
                        now_ms(),
                    )
                    .await?;
                Ok(SummarizeOutcome { summary_id: None, count: deleted, deleted })
            }
        }
    }

    /// `searchCode` (spec §4.8).
    pub async fn search_code(&self, query: &str, opts: CodeSearchOptions) -> Result<CodeSearchResult> {
        let index = self.code_index().await?;
        index.search(query, &opts).await
    }

    async fn code_index(&self) -> Result<Arc<CodeIndex>> {
        self.code_index
            .get_or_try_init(|| async {
                Ok::<Arc<CodeIndex>, Error>(Arc::new(CodeIndex::new(
                    PathBuf::from(&self.project_path),
                    self.config.code_index.clone(),
                    Arc::new(RegexSymbolExtractor) as Arc<dyn SymbolExtractor>,
                    Some(self.embedder.clone()),
                    self.code_index_store.clone(),
                )))
            })
            .await
            .cloned()
    }

    /// `orient` (spec §4.9): time anchor, offline-gap report, `last_seen`
    /// bump, and fire-and-forget decay + code-index refresh.
    pub async fn orient(self: &Arc<Self>, _timezone: Option<String>) -> Result<OrientResult> {
        let now = now_ms();
        let last_seen = self.tier2.get_last_seen().await?;

        let offline_gap = match last_seen.and_then(|entry| entry.value.parse::<i64>().ok()) {
            Some(from) => {
                let memories_added = self.tier2.get_memories_since(from).await?.len();
                Some(OfflineGap {
                    duration_ms: (now - from).max(0),
                    duration_human: humanize_duration_ms(now - from),
                    from,
                    to: now,
                    memories_added,
                })
            }
            None => None,
        };
        self.tier2.update_last_seen(now).await?;

        DecayScheduler::trigger_fire_and_forget(
            self.tier3.clone(),
            self.config.context.decay_days,
            self.config.context.decay_threshold,
        );

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            match engine.code_index().await {
                Ok(index) => {
                    if let Err(error) = index.refresh().await {
                        tracing::warn!(%error, "orient-triggered code index refresh failed");
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "orient could not open the code index store");
                }
            }
        });

        let recent_memories = self.tier2.get_recent(10).await?;
        let summary = match &offline_gap {
            None => "First session for this project.".to_string(),
            Some(gap) if gap.memories_added > 0 => format!(
                "Resumed after {}; {} new memories since last session.",
                gap.duration_human, gap.memories_added
            ),
            Some(gap) => format!("Resumed after {}.", gap.duration_human),
        };

        Ok(OrientResult {
            summary,
            time: TimeAnchor {
                epoch_ms: now,
                iso: chrono::DateTime::from_timestamp_millis(now)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            },
            project_path: self.project_path.clone(),
            offline_gap,
            recent_memories,
        })
    }

    /// `getContextWindow` (spec §4.9's 8-step assembly algorithm).
    pub async fn get_context_window(&self, prefs: ContextWindowPrefs) -> Result<ContextWindow> {
        let cfg = &self.config.context;
        let max_working = prefs.max_working_memories.unwrap_or(cfg.max_working_memories);
        let max_relevant = prefs.max_relevant_memories.unwrap_or(cfg.max_relevant_memories);
        let max_patterns = prefs.max_patterns.unwrap_or(cfg.max_patterns);
        let max_ghost = prefs.max_ghost_messages.unwrap_or(cfg.max_ghost_messages);
        let max_suggestions = prefs.max_suggestions.unwrap_or(cfg.max_suggestions);

        let working: Vec<Memory> = self.tier1.get_all().into_iter().take(max_working).collect();

        let seed = working
            .iter()
            .take(3)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut relevant = Vec::new();
        if !seed.trim().is_empty() {
            for memory in self.tier2.get_recent(5).await? {
                let score = 0.8 * (f64::from(memory.metadata.clamped_weight()) / 3.0);
                relevant.push(ScoredMemory { memory, score });
            }
            let query_embedding = self.embedder.embed(&seed).await?;
            for (memory, cosine) in self.tier3.recall_semantic(&query_embedding, 5).await? {
                let score = cosine * (f64::from(memory.metadata.clamped_weight()) / 3.0);
                relevant.push(ScoredMemory { memory, score });
            }
        }
        relevant.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        relevant.truncate(max_relevant);

        let mut patterns = self
            .tier3
            .list(&ListFilter {
                types: vec!["code_pattern".to_string()],
                tags: Vec::new(),
                project_path: None,
                limit: 0,
                offset: 0,
            })
            .await?
            .into_iter()
            .filter(|m| m.metadata.project_path.as_deref() == Some(self.project_path.as_str()))
            .collect::<Vec<_>>();
        if let Some(language) = &prefs.current_file_language {
            patterns.retain(|m| {
                m.metadata
                    .file_context
                    .as_ref()
                    .and_then(|fc| fc.language.as_deref())
                    == Some(language.as_str())
            });
        }
        patterns.truncate(max_patterns);

        let ghost_messages = build_ghost_messages(&working, &relevant, max_ghost);
        let suggestions = build_suggestions(&relevant, &patterns, max_suggestions);

        Ok(ContextWindow { working, relevant, patterns, suggestions, ghost_messages })
    }

    /// Closes the per-project store handles. The shared tier-3 store is
    /// closed by [`EngineRegistry::shutdown`], not here.
    pub async fn close(&self) -> Result<()> {
        if let Some(handle) = self.housekeeping.lock().take() {
            handle.abort();
        }
        self.tier2.close().await?;
        self.code_index_store.close().await
    }

    /// Spawns the tier-1 expiry sweep (spec §4.2 "intended to run ~60s").
    /// Called once by [`EngineRegistry::engine_for`] right after
    /// construction, since it needs an `Arc` to outlive the call that
    /// created the engine.
    fn spawn_housekeeping(self: Arc<Self>) {
        let period = Duration::from_secs(self.config.ttl.l1_cleanup_interval_seconds.max(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let removed = self.tier1.cleanup();
                if removed > 0 {
                    tracing::debug!(removed, project = %self.project_path, "tier-1 expiry sweep");
                }
            }
        });
        *self.housekeeping.lock() = Some(handle);
    }
}

fn fill_store_defaults(metadata: &mut Metadata, project_path: &str) {
    if metadata.confidence.is_none() {
        metadata.confidence = Some(0.8);
    }
    if metadata.source.is_none() {
        metadata.source = Some(Source::AiInferred);
    }
    if metadata.cli_type.is_none() {
        metadata.cli_type = Some("generic".to_string());
    }
    if metadata.project_path.is_none() {
        metadata.project_path = Some(project_path.to_string());
    }
}

/// Applies the in-place fields of an update request; returns whether
/// `content` changed, since only a content change requires a fresh
/// embedding for tier-3 entries.
fn apply_update(memory: &mut Memory, req: &UpdateRequest) -> bool {
    let mut content_changed = false;
    if let Some(content) = &req.content {
        if content != &memory.content {
            memory.content = content.clone();
            content_changed = true;
        }
    }
    if let Some(metadata) = &req.metadata {
        memory.metadata = metadata.clone();
    }
    if let Some(tags) = &req.tags {
        memory.metadata.tags = tags.clone();
    }
    if let Some(weight) = req.weight {
        memory.metadata.weight = weight;
    }
    if let Some(pinned) = req.pinned {
        memory.pinned = pinned;
    }
    memory.updated_at = now_ms();
    content_changed
}

fn to_list_filter(opts: &ListOptions, project_path: Option<&str>) -> ListFilter {
    ListFilter {
        types: opts.memory_type.clone().into_iter().collect(),
        tags: opts.tags.clone(),
        project_path: project_path.map(str::to_string),
        limit: 0,
        offset: 0,
    }
}

fn matches_list_filter(memory: &Memory, opts: &ListOptions) -> bool {
    if let Some(t) = &opts.memory_type {
        if memory.memory_type.as_str() != t {
            return false;
        }
    }
    if !opts.tags.is_empty() && !opts.tags.iter().any(|t| memory.metadata.has_tag(t)) {
        return false;
    }
    true
}

fn build_ghost_messages(working: &[Memory], relevant: &[ScoredMemory], max: usize) -> Vec<String> {
    let mut out = Vec::new();
    for memory in working.iter().chain(relevant.iter().map(|s| &s.memory)) {
        if out.len() >= max {
            break;
        }
        if is_decision_or_bugfix(&memory.memory_type) {
            let label = match memory.memory_type.as_str() {
                "bug_fix" => "Fixed",
                "error" => "Hit an error",
                _ => "Decided",
            };
            out.push(format!("{label}: {}", truncate_summary(&memory.content)));
        } else if let Some(fc) = &memory.metadata.file_context {
            out.push(format!("Recently touched {}", fc.path));
        }
    }
    out
}

fn build_suggestions(relevant: &[ScoredMemory], patterns: &[Memory], max: usize) -> Vec<String> {
    let mut out = Vec::new();
    for scored in relevant {
        if out.len() >= max {
            break;
        }
        let line = match scored.memory.memory_type.as_str() {
            "bug_fix" => Some(format!("Watch for regressions near: {}", truncate_summary(&scored.memory.content))),
            "decision" => Some(format!("Stay consistent with: {}", truncate_summary(&scored.memory.content))),
            "error" => Some(format!("Double-check handling for: {}", truncate_summary(&scored.memory.content))),
            _ => None,
        };
        if let Some(line) = line {
            out.push(line);
        }
    }
    for pattern in patterns {
        if out.len() >= max {
            break;
        }
        out.push(format!("Reuse pattern: {}", truncate_summary(&pattern.content)));
    }
    out
}

fn truncate_summary(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or(content);
    let truncated: String = first_line.chars().take(80).collect();
    if truncated.chars().count() < first_line.chars().count() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

fn humanize_duration_ms(ms: i64) -> String {
    let secs = (ms.max(0) / 1000) as u64;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}
