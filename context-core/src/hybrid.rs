//! The hybrid recall pipeline: fan out to the three tiers, fuse ranked
//! lists via Reciprocal Rank Fusion, normalize, weight-boost, and
//! threshold-filter (spec §4.6).

use std::collections::HashMap;

use crate::api::{RecallFilter, RecallHit, RecallMode, RecallOptions, RecallResult};
use crate::embedding::EmbeddingService;
use crate::error::Result;
use crate::model::{Memory, Tier};
use crate::tier1::Tier1Store;
use crate::traits::{Tier2Store, Tier3Store};

/// RRF's rank-damping constant (spec GLOSSARY).
const RRF_K: f64 = 60.0;

struct Candidate {
    memory: Memory,
    score: f64,
}

/// Run the pipeline for `query` against the three tiers the engine owns.
pub async fn recall(
    tier1: &Tier1Store,
    tier2: &dyn Tier2Store,
    tier3: &dyn Tier3Store,
    embedder: &EmbeddingService,
    query: &str,
    opts: &RecallOptions,
) -> Result<RecallResult> {
    let over_fetch = opts.limit.saturating_mul(2).max(opts.limit);

    let want_semantic = matches!(opts.mode, RecallMode::Semantic | RecallMode::Hybrid);
    let want_keyword = matches!(opts.mode, RecallMode::Keyword | RecallMode::Hybrid);

    let mut semantic_list = Vec::new();
    if want_semantic {
        let query_embedding = embedder.embed(query).await?;
        let hits = tier3.recall_semantic(&query_embedding, over_fetch).await?;
        semantic_list.extend(hits.into_iter().map(|(memory, score)| Candidate { memory, score }));
    }

    let mut keyword_list = Vec::new();
    if want_keyword {
        let l2 = tier2.search_bm25(query, over_fetch).await?;
        let l3 = tier3.search_bm25(query, over_fetch).await?;
        keyword_list.extend(l2.into_iter().map(|(memory, score)| Candidate { memory, score }));
        keyword_list.extend(l3.into_iter().map(|(memory, score)| Candidate { memory, score }));
    }

    let mut substring_list = Vec::new();
    if matches!(opts.mode, RecallMode::Semantic) {
        let l2 = tier2.search_like(query).await?;
        substring_list.extend(
            l2.into_iter()
                .take(over_fetch)
                .map(|memory| Candidate { memory, score: 1.0 }),
        );
    }
    substring_list.extend(
        tier1
            .search_substring(query)
            .into_iter()
            .map(|memory| Candidate { memory, score: 1.0 }),
    );

    let filter = opts.filter.as_ref();
    let lists = [semantic_list, keyword_list, substring_list]
        .into_iter()
        .map(|list| apply_cheap_filter(list, filter))
        .collect::<Vec<_>>();

    let fused = fuse(lists);
    let mut hits = finalize(fused, filter, opts.threshold);
    hits.truncate(opts.limit);
    let total = hits.len();
    Ok(RecallResult { results: hits, total })
}

/// Drop candidates that fail the cheap, pushdown-friendly predicates
/// (tier, project path) before fusion, per spec §4.6.
fn apply_cheap_filter(list: Vec<Candidate>, filter: Option<&RecallFilter>) -> Vec<Candidate> {
    let Some(filter) = filter else { return list };
    list.into_iter()
        .filter(|c| {
            if !filter.tiers.is_empty() && !filter.tiers.contains(&c.memory.tier) {
                return false;
            }
            if let Some(path) = &filter.project_path {
                if c.memory.metadata.project_path.as_deref() != Some(path.as_str()) {
                    return false;
                }
            }
            true
        })
        .collect()
}

struct Fused {
    memory: Memory,
    rrf_score: f64,
    best_underlying: f64,
}

/// Accumulate `1/(k+rank)` per id across every input list, keeping the
/// representation (and underlying score) from whichever list scored it
/// highest (spec §4.6: "keep the representation whose underlying
/// similarity is higher").
fn fuse(lists: Vec<Vec<Candidate>>) -> HashMap<String, Fused> {
    let mut acc: HashMap<String, Fused> = HashMap::new();
    for list in lists {
        for (idx, candidate) in list.into_iter().enumerate() {
            let rank = (idx + 1) as f64;
            let contribution = 1.0 / (RRF_K + rank);
            match acc.get_mut(&candidate.memory.id) {
                Some(entry) => {
                    entry.rrf_score += contribution;
                    if candidate.score > entry.best_underlying {
                        entry.best_underlying = candidate.score;
                        entry.memory = candidate.memory;
                    }
                }
                None => {
                    acc.insert(
                        candidate.memory.id.clone(),
                        Fused {
                            memory: candidate.memory,
                            rrf_score: contribution,
                            best_underlying: candidate.score,
                        },
                    );
                }
            }
        }
    }
    acc
}

/// Normalize to `[0, 1]` by the top score, apply the weight multiplier,
/// apply the post-fusion filters (types/tags), threshold-filter, and sort
/// descending with the documented tie-break.
fn finalize(
    fused: HashMap<String, Fused>,
    filter: Option<&RecallFilter>,
    threshold: f64,
) -> Vec<RecallHit> {
    let top = fused
        .values()
        .map(|f| f.rrf_score)
        .fold(0.0_f64, f64::max);

    let mut hits: Vec<(RecallHit, f64)> = fused
        .into_values()
        .filter(|f| passes_post_filter(&f.memory, filter))
        .map(|f| {
            let normalized = if top > 0.0 { f.rrf_score / top } else { 0.0 };
            let weight = f64::from(f.memory.metadata.clamped_weight());
            let score = normalized * (weight / 3.0);
            (
                RecallHit {
                    layer: f.memory.tier.as_u8(),
                    memory: f.memory,
                    similarity: score,
                },
                f.best_underlying,
            )
        })
        .filter(|(hit, _)| hit.similarity >= threshold)
        .collect();

    hits.sort_by(|(a, a_underlying), (b, b_underlying)| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b_underlying.partial_cmp(a_underlying).unwrap_or(std::cmp::Ordering::Equal))
    });
    hits.into_iter().map(|(hit, _)| hit).collect()
}

fn passes_post_filter(memory: &Memory, filter: Option<&RecallFilter>) -> bool {
    let Some(filter) = filter else { return true };
    if !filter.types.is_empty() && !filter.types.contains(&memory.memory_type.as_str().to_string())
    {
        return false;
    }
    if !filter.tags.is_empty() && !filter.tags.iter().any(|t| memory.metadata.has_tag(t)) {
        return false;
    }
    true
}

/// Placement helper used by tests and by [`crate::engine::ContextEngine`]
/// when it needs to know which tier a hit's `similarity` came from.
pub fn layer_of(tier: Tier) -> u8 {
    tier.as_u8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metadata, MemoryType};

    fn mem(id: &str, weight: u8) -> Memory {
        let mut m = Memory::new(
            MemoryType::Decision,
            Tier::Project,
            format!("content {id}"),
            Metadata {
                weight,
                ..Metadata::default()
            },
        );
        m.id = id.to_string();
        m
    }

    #[test]
    fn rrf_tie_break_prefers_higher_underlying_and_order_invariance() {
        // keyword ranker: [A, B, C]; semantic ranker: [C, B, A].
        //
        // rrf(a) = 1/61 + 1/63, rrf(c) = 1/61 + 1/63 (same two ranks, from
        // opposite lists) — a and c tie exactly. rrf(b) = 1/62 + 1/62, which
        // is strictly smaller (1/61+1/63 < 2/62 is false; 1/61+1/63 ≈
        // 0.0322664 > 1/31 ≈ 0.0322581), so b ranks behind the a/c tie, not
        // ahead of it. Spec §8 scenario 3 asserts b ranks first on this same
        // input, but its own worked arithmetic (1/61+1/62 for b) doesn't
        // match the b-rank-2-in-both-lists input it describes; this is the
        // spec's own inconsistency (spec §9 flags the broader RRF math as
        // worth double-checking), not a bug here. Reconciled in favor of the
        // arithmetic both the spec and this implementation agree on: accumulate
        // 1/(k+rank) per list. c wins the a/c tie via the higher underlying
        // score (spec §4.6 "keep the representation whose underlying
        // similarity is higher").
        let keyword = vec![
            Candidate { memory: mem("a", 3), score: 0.9 },
            Candidate { memory: mem("b", 3), score: 0.8 },
            Candidate { memory: mem("c", 3), score: 0.7 },
        ];
        let semantic = vec![
            Candidate { memory: mem("c", 3), score: 0.95 },
            Candidate { memory: mem("b", 3), score: 0.85 },
            Candidate { memory: mem("a", 3), score: 0.75 },
        ];
        let fused = fuse(vec![semantic, keyword]);
        let mut hits = finalize(fused, None, 0.0);
        hits.truncate(3);
        assert_eq!(hits[0].memory.id, "c");
        assert_eq!(hits[1].memory.id, "a");
        assert_eq!(hits[2].memory.id, "b");
    }

    #[test]
    fn fusion_is_order_invariant_in_input_lists() {
        let keyword = vec![
            Candidate { memory: mem("a", 3), score: 0.9 },
            Candidate { memory: mem("b", 3), score: 0.8 },
        ];
        let semantic = vec![
            Candidate { memory: mem("b", 3), score: 0.6 },
            Candidate { memory: mem("a", 3), score: 0.5 },
        ];
        let forward = fuse(vec![semantic.clone(), keyword.clone()]).get("a").unwrap().rrf_score;
        let backward = fuse(vec![keyword, semantic]).get("a").unwrap().rrf_score;
        assert!((forward - backward).abs() < 1e-12);
    }

    #[test]
    fn weight_boost_orders_higher_weight_first() {
        let list = vec![
            Candidate { memory: mem("low", 1), score: 0.9 },
            Candidate { memory: mem("high", 5), score: 0.9 },
        ];
        let fused = fuse(vec![list]);
        let hits = finalize(fused, None, 0.0);
        assert_eq!(hits[0].memory.id, "high");
    }

    #[test]
    fn threshold_filters_low_scores() {
        let list = vec![Candidate { memory: mem("only", 3), score: 0.9 }];
        let fused = fuse(vec![list]);
        let hits = finalize(fused, None, 2.0);
        assert!(hits.is_empty());
    }
}
