//! The decay scheduler: a periodic background task plus an on-demand,
//! fire-and-forget trigger, both invoking `Tier3Store::apply_decay` (spec
//! §4.7). Spawn-and-detach tasks owned by the engine, aborted on teardown
//! (spec §9 redesign note).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::model::now_ms;
use crate::traits::Tier3Store;

/// Owns the periodic decay task's handle. Dropping (or calling
/// [`DecayScheduler::shutdown`]) aborts it; in-flight `apply_decay` calls
/// triggered on-demand are not tracked here since they're meant to outlive
/// the triggering `orient` call by design (fire-and-forget).
pub struct DecayScheduler {
    periodic: Option<JoinHandle<()>>,
}

impl DecayScheduler {
    /// Spawn the 1-hour-period background task. Failures are logged and
    /// swallowed (spec §7 "Decay failures are logged and swallowed").
    pub fn start(tier3: Arc<dyn Tier3Store>, decay_days: f64, threshold: f64, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                run_once(&*tier3, decay_days, threshold).await;
            }
        });
        Self { periodic: Some(handle) }
    }

    /// Fire a single decay pass in the background without blocking the
    /// caller (spec §4.7 item 1, triggered by every `orient` call).
    pub fn trigger_fire_and_forget(tier3: Arc<dyn Tier3Store>, decay_days: f64, threshold: f64) {
        tokio::spawn(async move {
            run_once(&*tier3, decay_days, threshold).await;
        });
    }

    /// Abort the periodic task. Any in-flight fire-and-forget pass is left
    /// to complete, per spec §5 "in-flight recalls are allowed to
    /// complete" (decay is treated the same way).
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.periodic.take() {
            handle.abort();
        }
    }
}

impl Drop for DecayScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_once(tier3: &dyn Tier3Store, decay_days: f64, threshold: f64) {
    match tier3.apply_decay(decay_days, threshold, now_ms()).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!(deleted, "tier-3 decay pass completed");
            }
        }
        Err(error) => {
            tracing::warn!(%error, "tier-3 decay pass failed; will retry next trigger");
        }
    }
}

/// The decay formula itself (spec §4.4), exposed here so `context-storage`
/// and tests share exactly one implementation rather than re-deriving it.
pub fn compute_relevance(
    created_at: i64,
    last_accessed_at: i64,
    access_count: u64,
    now_ms: i64,
    decay_days: f64,
) -> f64 {
    let day_ms = 86_400_000.0;
    let age_ms = (now_ms - created_at).max(0) as f64;
    let since_access_ms = (now_ms - last_accessed_at).max(0) as f64;

    let age_decay = (-age_ms / (2.0 * decay_days * day_ms)).exp();
    let inactivity = (-since_access_ms / (decay_days * day_ms)).exp();
    let access_boost = (access_count as f64 / 10.0).min(0.5);

    (age_decay * 0.3 + inactivity * 0.7 + access_boost).clamp(0.0, 1.0)
}

/// Whether a score difference is large enough to be worth a write, per
/// spec §4.4 "persist `new_score` only if it differs... by more than
/// 0.01 (to minimize write amplification)".
pub fn is_significant_change(old_score: f64, new_score: f64) -> bool {
    (old_score - new_score).abs() > 0.01
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_has_high_relevance() {
        let now = now_ms();
        let score = compute_relevance(now, now, 0, now, 14.0);
        assert!(score > 0.95, "expected near 1.0, got {score}");
    }

    #[test]
    fn stale_entry_crosses_threshold() {
        let now = now_ms();
        let year_ago = now - 365 * 86_400_000;
        let score = compute_relevance(year_ago, year_ago, 0, now, 14.0);
        assert!(score < 0.2, "expected below default threshold, got {score}");
    }

    #[test]
    fn access_boost_is_capped_at_half() {
        let now = now_ms();
        let score = compute_relevance(now, now, 1000, now, 14.0);
        assert!(score <= 1.0);
    }

    #[test]
    fn insignificant_change_is_not_worth_a_write() {
        assert!(!is_significant_change(0.50, 0.505));
        assert!(is_significant_change(0.50, 0.48));
    }
}
