// src/embedding.rs
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use log::info;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokenizers::Tokenizer;

/// Maximum token sequence length fed to the encoder.
const MAX_SEQ_LEN: usize = 256;

/// Default capacity of the embedding memoization cache; override with
/// EMBEDDING_CACHE_SIZE.
const DEFAULT_CACHE_SIZE: usize = 20000;

/// A model that turns normalized address text into a fixed-width dense
/// vector. The production implementation is `BertEmbedder`; tests plug in
/// a deterministic stub.
pub trait TextEmbedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Sentence embedder: BERT encoder with mean pooling and L2 normalization,
/// loaded from local artifact files (config.json, tokenizer.json,
/// model.safetensors).
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = Device::Cpu;

        let config_path = model_dir.join("config.json");
        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read embedder config {}", config_path.display()))?;
        let config: BertConfig =
            serde_json::from_str(&config_str).context("Failed to parse BERT config")?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {e}"))?;

        let weights_path = model_dir.join("model.safetensors");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&weights_path], DTYPE, &device).with_context(
                || format!("Failed to load embedder weights {}", weights_path.display()),
            )?
        };
        let model = BertModel::load(vb, &config).context("Failed to load BERT model")?;

        let dimension = config.hidden_size;
        info!(
            "Loaded sentence embedder from {} ({} dims)",
            model_dir.display(),
            dimension
        );
        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
        })
    }
}

impl TextEmbedder for BertEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {e}"))?;
        let mut tokens: Vec<u32> = encoding.get_ids().to_vec();
        if tokens.len() > MAX_SEQ_LEN {
            tokens.truncate(MAX_SEQ_LEN);
        }
        let seq_len = tokens.len();

        let input_ids = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::zeros((1, seq_len), DType::U32, &self.device)?;

        let hidden_states = self
            .model
            .forward(&input_ids, &token_type_ids, None)
            .context("BERT forward pass failed")?;

        // Mean pooling over the sequence, then L2 normalization.
        let pooled = hidden_states.mean(1)?.squeeze(0)?;
        let norm = pooled
            .sqr()?
            .sum_all()?
            .sqrt()?
            .to_scalar::<f32>()?
            .max(1e-12);
        let pooled = (pooled / norm as f64)?;

        Ok(pooled.to_vec1::<f32>()?)
    }
}

/// Memoizing front for a `TextEmbedder`: exact-text LRU cache shared across
/// batches, plus an instrumentation counter of real embedder invocations.
/// Concurrent lookups of the same text may both miss; the overwrite is
/// idempotent.
pub struct EmbeddingCache {
    embedder: Box<dyn TextEmbedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    computed: AtomicUsize,
}

impl EmbeddingCache {
    pub fn new(embedder: Box<dyn TextEmbedder>) -> Self {
        let cache_size = std::env::var("EMBEDDING_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .and_then(NonZeroUsize::new)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap());
        Self {
            embedder,
            cache: Mutex::new(LruCache::new(cache_size)),
            computed: AtomicUsize::new(0),
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Number of times the underlying embedder actually ran.
    pub fn embeddings_computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self
            .cache
            .lock()
            .expect("embedding cache poisoned")
            .get(text)
        {
            return Ok(hit.clone());
        }
        let embedding = self.embedder.embed(text)?;
        self.computed.fetch_add(1, Ordering::Relaxed);
        self.cache
            .lock()
            .expect("embedding cache poisoned")
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Deterministic stand-in for the BERT embedder: hashes tokens into a
    /// small fixed-width vector so nearby spellings stay nearby-ish and
    /// results are reproducible.
    pub(crate) struct StubEmbedder {
        pub dimension: usize,
    }

    impl TextEmbedder for StubEmbedder {
        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; self.dimension];
            for token in text.split_whitespace() {
                let mut h: u64 = 1469598103934665603;
                for b in token.bytes() {
                    h ^= b as u64;
                    h = h.wrapping_mul(1099511628211);
                }
                v[(h % self.dimension as u64) as usize] += 1.0;
            }
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut v {
                    *x /= norm;
                }
            }
            Ok(v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::StubEmbedder;
    use super::*;

    #[test]
    fn cache_computes_each_text_once() {
        let cache = EmbeddingCache::new(Box::new(StubEmbedder { dimension: 8 }));
        let a1 = cache.embed("salmiya block 1").unwrap();
        let a2 = cache.embed("salmiya block 1").unwrap();
        assert_eq!(a1, a2);
        assert_eq!(cache.embeddings_computed(), 1);

        cache.embed("hawalli block 4").unwrap();
        assert_eq!(cache.embeddings_computed(), 2);
    }

    #[test]
    fn stub_is_deterministic_and_normalized() {
        let stub = StubEmbedder { dimension: 8 };
        let v1 = stub.embed("salmiya block 1").unwrap();
        let v2 = stub.embed("salmiya block 1").unwrap();
        assert_eq!(v1, v2);
        let norm = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
