//! ONNX-backed embedding model loading.
//!
//! A model name resolves to three cached files (`<name>.onnx`, `<name>_tokenizer.json`,
//! `<name>_config.json`) under the cache directory. With the `model-download`
//! feature enabled, missing files are fetched from HuggingFace on first use;
//! otherwise they must be pre-staged in the cache directory. Without the
//! `local-embeddings` feature at all, [`load`] returns a deterministic hash
//! embedding instead of a real model — useful for tests and for builds that
//! can't carry the ONNX runtime.

use std::path::PathBuf;
use std::sync::Arc;

use super::EmbeddingBackend;

/// Resolve the default on-disk cache directory for downloaded embedding
/// models: `$HOME/.context-fabric/models`, falling back to a relative path
/// when the home directory can't be determined.
pub fn default_cache_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".context-fabric").join("models"))
        .unwrap_or_else(|| PathBuf::from(".context-fabric/models"))
}

#[cfg(feature = "local-embeddings")]
pub async fn load(
    model_name: &str,
    cache_dir: &std::path::Path,
    dimension: usize,
) -> anyhow::Result<Arc<dyn EmbeddingBackend>> {
    real::load(model_name, cache_dir, dimension).await
}

#[cfg(not(feature = "local-embeddings"))]
pub async fn load(
    model_name: &str,
    _cache_dir: &std::path::Path,
    dimension: usize,
) -> anyhow::Result<Arc<dyn EmbeddingBackend>> {
    tracing::warn!(
        model = model_name,
        "local-embeddings feature disabled; using deterministic hash embedding"
    );
    Ok(Arc::new(hash_fallback::HashEmbeddingBackend { dimension }))
}

/// A deterministic, dependency-free stand-in for a real model: hashes each
/// token into a bucket and L2-normalizes the result. Not semantically
/// meaningful, but stable and cheap, which is all the cache-eviction and
/// plumbing tests around [`super::EmbeddingService`] need.
mod hash_fallback {
    use super::EmbeddingBackend;

    pub struct HashEmbeddingBackend {
        pub dimension: usize,
    }

    #[async_trait::async_trait]
    impl EmbeddingBackend for HashEmbeddingBackend {
        async fn embed_batch(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| embed_one(t, self.dimension)).collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn embed_one(text: &str, dimension: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dimension];
        for (i, byte) in text.bytes().enumerate() {
            let bucket = (usize::from(byte) + i) % dimension;
            v[bucket] += 1.0;
        }
        super::normalize(v)
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(feature = "local-embeddings")]
mod real {
    use std::path::Path;
    use std::sync::Arc;

    use ort::session::Session;
    use ort::value::TensorRef;
    use tokenizers::Tokenizer;
    use tokio::sync::Mutex as AsyncMutex;

    use super::EmbeddingBackend;

    pub async fn load(
        model_name: &str,
        cache_dir: &Path,
        dimension: usize,
    ) -> anyhow::Result<Arc<dyn EmbeddingBackend>> {
        super::download::ensure_downloaded(model_name, cache_dir).await?;

        let sanitized = model_name.replace('/', "_");
        let onnx_path = cache_dir.join(format!("{sanitized}.onnx"));
        let tokenizer_path = cache_dir.join(format!("{sanitized}_tokenizer.json"));

        let (tokenizer, session) =
            tokio::task::spawn_blocking(move || -> anyhow::Result<(Tokenizer, Session)> {
                let tokenizer = Tokenizer::from_file(&tokenizer_path)
                    .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
                let session = Session::builder()?.commit_from_file(&onnx_path)?;
                Ok((tokenizer, session))
            })
            .await??;

        Ok(Arc::new(OnnxEmbeddingBackend {
            dimension,
            tokenizer,
            session: AsyncMutex::new(session),
        }))
    }

    struct OnnxEmbeddingBackend {
        dimension: usize,
        tokenizer: Tokenizer,
        session: AsyncMutex<Session>,
    }

    #[async_trait::async_trait]
    impl EmbeddingBackend for OnnxEmbeddingBackend {
        async fn embed_batch(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed_one(text).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    impl OnnxEmbeddingBackend {
        async fn embed_one(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            let encoding = self.tokenizer.encode(text, false).map_err(|e| {
                crate::error::Error::EmbeddingUnavailable(format!("tokenize failed: {e}"))
            })?;
            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| i64::from(m))
                .collect();

            let guard = self.session.lock().await;
            let pooled = run_inference(&guard, input_ids, attention_mask)
                .map_err(|e| crate::error::Error::EmbeddingUnavailable(e.to_string()))?;
            Ok(super::normalize(pooled))
        }
    }

    /// One forward pass, mean-pooled over the sequence dimension. Holding the
    /// session behind a plain async lock (rather than `spawn_blocking`, as the
    /// teacher's batch downloader does) keeps single-text calls on the
    /// calling task; the session itself is fast enough on CPU that the extra
    /// thread hop isn't worth it here.
    fn run_inference(
        session: &Session,
        input_ids: Vec<i64>,
        attention_mask: Vec<i64>,
    ) -> anyhow::Result<Vec<f32>> {
        let seq_len = input_ids.len();
        let input_ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)?.into_dyn();
        let attention_mask_array =
            ndarray::Array2::from_shape_vec((1, seq_len), attention_mask)?.into_dyn();

        let input_ids_tensor = TensorRef::from_array_view(input_ids_array.view())?;
        let attention_mask_tensor = TensorRef::from_array_view(attention_mask_array.view())?;

        let mut outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
        })?;

        let output = outputs
            .remove("last_hidden_state")
            .ok_or_else(|| anyhow::anyhow!("model output missing last_hidden_state"))?;
        let array: ndarray::ArrayViewD<f32> = output.try_extract_array()?;
        let shape = array.shape();
        if shape.len() != 3 {
            anyhow::bail!("unexpected embedding output shape: {shape:?}");
        }
        let (batch, seq, hidden) = (shape[0], shape[1], shape[2]);
        if batch != 1 {
            anyhow::bail!("expected batch size 1, got {batch}");
        }
        let data = array
            .as_slice()
            .ok_or_else(|| anyhow::anyhow!("embedding output is not contiguous"))?;

        let mut pooled = vec![0.0f32; hidden];
        for s in 0..seq {
            for h in 0..hidden {
                pooled[h] += data[s * hidden + h];
            }
        }
        for v in &mut pooled {
            *v /= seq as f32;
        }
        Ok(pooled)
    }
}

#[cfg(feature = "local-embeddings")]
mod download {
    use std::path::Path;

    const FILE_SUFFIXES: [&str; 3] = [".onnx", "_tokenizer.json", "_config.json"];

    pub async fn ensure_downloaded(model_name: &str, cache_dir: &Path) -> anyhow::Result<()> {
        let sanitized = model_name.replace('/', "_");
        tokio::fs::create_dir_all(cache_dir).await?;

        for suffix in FILE_SUFFIXES {
            let filename = format!("{sanitized}{suffix}");
            let target = cache_dir.join(&filename);
            if target.exists() && tokio::fs::metadata(&target).await?.len() > 0 {
                continue;
            }
            fetch(model_name, &filename, &target).await?;
        }
        Ok(())
    }

    #[cfg(feature = "model-download")]
    async fn fetch(model_name: &str, filename: &str, target: &Path) -> anyhow::Result<()> {
        use futures::StreamExt;
        use tokio::io::AsyncWriteExt;

        let url = format!("https://huggingface.co/{model_name}/resolve/main/{filename}");
        tracing::info!(url, "downloading embedding model file");
        let response = reqwest::get(&url).await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {} downloading {url}", response.status());
        }
        let mut writer = tokio::io::BufWriter::new(tokio::fs::File::create(target).await?);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            writer.write_all(&chunk?).await?;
        }
        writer.flush().await?;
        Ok(())
    }

    #[cfg(not(feature = "model-download"))]
    async fn fetch(_model_name: &str, filename: &str, target: &Path) -> anyhow::Result<()> {
        anyhow::bail!(
            "embedding model file {filename} is missing from the cache directory and the \
             `model-download` feature is disabled; stage it at {}",
            target.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_backend_is_deterministic() {
        let backend = hash_fallback::HashEmbeddingBackend { dimension: 16 };
        let a = backend.embed_batch(&["hello".to_string()]).await.unwrap();
        let b = backend.embed_batch(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 16);
    }
}
