//! The embedding service: text → 384-dim vector, with a bounded LRU cache,
//! single-flight model initialization, a terminal broken state on init
//! failure, and a per-call deadline.
//!
//! Unlike a recoverable circuit breaker (closed/open/half-open with a
//! timeout), this is a one-way breaker: once initialization fails there is
//! no automatic recovery short of a process restart. `OnceCell::get_or_init`
//! gives that for free by caching the `Err` outcome permanently alongside
//! the `Ok` one.

mod onnx;

use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::model::EMBEDDING_DIM;

/// Anything that can turn text into a dense vector. Implemented by the
/// ONNX-backed model and by a deterministic fallback used in builds where
/// the `local-embeddings` feature is disabled.
#[async_trait::async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
}

type BackendResult = std::result::Result<Arc<dyn EmbeddingBackend>, String>;

/// Converts text to fixed-dimension embeddings, amortizing cost via an LRU
/// cache over input strings (spec §4.1).
pub struct EmbeddingService {
    cache: Mutex<LruCache<String, Vec<f64>>>,
    init: OnceCell<BackendResult>,
    dimension: usize,
    deadline: Duration,
    model_name: String,
    cache_dir: std::path::PathBuf,
}

impl EmbeddingService {
    pub fn new(config: &crate::config::EmbeddingConfig) -> Self {
        let cap = std::num::NonZeroUsize::new(config.cache_capacity.max(1))
            .expect("cache_capacity.max(1) is never zero");
        Self {
            cache: Mutex::new(LruCache::new(cap)),
            init: OnceCell::new(),
            dimension: config.dimension,
            deadline: Duration::from_secs(config.deadline_seconds.max(1)),
            model_name: config.model_name.clone(),
            cache_dir: config
                .cache_dir
                .clone()
                .unwrap_or_else(onnx::default_cache_dir),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// `true` once the model has failed to initialize and further calls
    /// will fail immediately (spec §4.1 "terminal broken state").
    pub async fn is_broken(&self) -> bool {
        matches!(self.init.get(), Some(Err(_)))
    }

    /// Embed a single string, serving from cache when possible.
    pub async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        if let Some(hit) = self.cache.lock().get(text).cloned() {
            tracing::debug!(chars = text.len(), "embedding cache hit");
            return Ok(hit);
        }
        let mut out = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        Ok(out.remove(0))
    }

    /// Embed many strings; uncached texts are submitted as one batch to the
    /// model, and results are cached and returned in input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut results: Vec<Option<Vec<f64>>> = Vec::with_capacity(texts.len());
        let mut misses = Vec::new();
        {
            let mut cache = self.cache.lock();
            for t in texts {
                if let Some(v) = cache.get(t) {
                    results.push(Some(v.clone()));
                } else {
                    results.push(None);
                    misses.push(t.clone());
                }
            }
        }

        if !misses.is_empty() {
            let backend = self.backend().await?;
            let fresh = tokio::time::timeout(self.deadline, backend.embed_batch(&misses))
                .await
                .map_err(|_| {
                    Error::EmbeddingUnavailable("embedding request exceeded deadline".into())
                })??;
            if fresh.len() != misses.len() {
                return Err(Error::EmbeddingUnavailable(
                    "model returned a mismatched batch size".into(),
                ));
            }
            let mut cache = self.cache.lock();
            let mut fresh_iter = fresh.into_iter();
            for slot in &mut results {
                if slot.is_none() {
                    let v: Vec<f64> = fresh_iter
                        .next()
                        .expect("misses and fresh results have matching length")
                        .into_iter()
                        .map(f64::from)
                        .collect();
                    *slot = Some(v);
                }
            }
            // Keys for the freshly-filled slots, in the same order as `misses`.
            let mut miss_iter = misses.iter();
            for (t, slot) in texts.iter().zip(results.iter()) {
                if miss_iter.as_slice().first().is_some_and(|m| m == t) {
                    miss_iter.next();
                    if let Some(v) = slot {
                        cache.put(t.clone(), v.clone());
                    }
                }
            }
        }

        Ok(results
            .into_iter()
            .map(|s| s.expect("every slot is filled from cache or a fresh batch"))
            .collect())
    }

    async fn backend(&self) -> Result<Arc<dyn EmbeddingBackend>> {
        let outcome = self
            .init
            .get_or_init(|| async {
                tracing::info!(model = %self.model_name, "initializing embedding model");
                match tokio::time::timeout(self.deadline, onnx::load(&self.model_name, &self.cache_dir, self.dimension)).await {
                    Ok(Ok(backend)) => Ok(backend),
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, "embedding model init failed; entering terminal broken state");
                        Err(e.to_string())
                    }
                    Err(_) => {
                        tracing::error!("embedding model init exceeded deadline; entering terminal broken state");
                        Err("model initialization deadline exceeded".to_string())
                    }
                }
            })
            .await;
        match outcome {
            Ok(backend) => Ok(Arc::clone(backend)),
            Err(msg) => Err(Error::EmbeddingUnavailable(format!(
                "{msg} (restart to retry)"
            ))),
        }
    }
}

/// Cosine similarity, 0 when either vector has zero norm (spec §4.1).
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Dimension asserted by [`EMBEDDING_DIM`]; kept as a free function so
/// callers outside this module don't need to construct a service just to
/// check the constant.
pub fn expected_dimension() -> usize {
    EMBEDDING_DIM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = vec![0.0; 4];
        let b = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_identical_vectors_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    /// A dependency-free stand-in for the real ONNX backend, local to this
    /// test module so cache/plumbing tests never take the `onnx::load` path
    /// (which, with the default `local-embeddings` feature on and no model
    /// staged in the cache directory, fails init and leaves the service
    /// permanently broken per spec §4.1).
    struct TestBackend;

    #[async_trait::async_trait]
    impl EmbeddingBackend for TestBackend {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; EMBEDDING_DIM];
                    for (i, byte) in t.bytes().enumerate() {
                        v[(usize::from(byte) + i) % EMBEDDING_DIM] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIM
        }
    }

    /// Builds a service with `init` pre-populated with [`TestBackend`], so
    /// `embed`/`embed_batch` exercise the cache and batching logic without
    /// ever calling `onnx::load`.
    fn test_service(cache_capacity: usize) -> EmbeddingService {
        let cap = std::num::NonZeroUsize::new(cache_capacity.max(1))
            .expect("cache_capacity.max(1) is never zero");
        let svc = EmbeddingService {
            cache: Mutex::new(LruCache::new(cap)),
            init: OnceCell::new(),
            dimension: EMBEDDING_DIM,
            deadline: Duration::from_secs(5),
            model_name: "test-backend".to_string(),
            cache_dir: std::path::PathBuf::new(),
        };
        svc.init
            .set(Ok(Arc::new(TestBackend) as Arc<dyn EmbeddingBackend>))
            .unwrap_or_else(|_| unreachable!("init is freshly constructed and empty"));
        svc
    }

    #[tokio::test]
    async fn embed_is_deterministic_and_cached() {
        let svc = test_service(4);
        let a = svc.embed("hello world").await.unwrap();
        let b = svc.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn cache_evicts_oldest_at_capacity() {
        let svc = test_service(2);
        svc.embed("a").await.unwrap();
        svc.embed("b").await.unwrap();
        svc.embed("c").await.unwrap();
        assert!(!svc.cache.lock().contains("a"));
        assert!(svc.cache.lock().contains("c"));
    }
}
