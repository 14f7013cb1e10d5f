//! Local ONNX Runtime embedding provider.
//!
//! Implements [`EmbeddingProvider`] for sentence-transformers exports via `ort`.
//! Uses the model's `sentence_embedding` output when the export carries its
//! pooling head; otherwise mean-pools token embeddings under the attention mask
//! and runs the optional [`DenseHead`] projection.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::dense::DenseHead;
use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;

/// Subdirectory of the model cache holding the dense projection head.
pub const DENSE_DIR: &str = "2_Dense";

/// Local ONNX-based sentence embedding provider.
pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    head: Option<DenseHead>,
    dimensions: usize,
    normalize: bool,
    token_type_ids: bool,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `mediarec model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `mediarec model download` first.",
            tokenizer_path.display()
        );

        let head = if config.has_dense_head() {
            let dense_dir = cache_dir.join(DENSE_DIR);
            anyhow::ensure!(
                dense_dir.join(super::dense::WEIGHTS_FILE).exists()
                    && dense_dir.join(super::dense::CONFIG_FILE).exists(),
                "Dense head not found at {}. Run `mediarec model download` first.",
                dense_dir.display()
            );
            let head = DenseHead::load(&dense_dir)?;
            anyhow::ensure!(
                head.out_features() == config.dimensions,
                "dense head outputs {} dimensions but embedding.dimensions is {}",
                head.out_features(),
                config.dimensions
            );
            Some(head)
        } else {
            None
        };

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %config.model, path = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: config.max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            head,
            dimensions: config.dimensions,
            normalize: config.normalize,
            token_type_ids: config.token_type_ids,
        })
    }

    /// Width of the mean-pooled transformer output.
    fn pooled_dimensions(&self) -> usize {
        self.head
            .as_ref()
            .map_or(self.dimensions, DenseHead::in_features)
    }

    /// Project a pooled vector through the dense head, then normalize if configured.
    fn finish_pooled(&self, pooled: Vec<f32>) -> Result<Vec<f32>> {
        let v = match &self.head {
            Some(head) => head.apply(&pooled)?,
            None => pooled,
        };
        Ok(self.finish(v))
    }

    fn finish(&self, v: Vec<f32>) -> Vec<f32> {
        if self.normalize {
            l2_normalize(&v)
        } else {
            v
        }
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text])?;
        results
            .into_iter()
            .next()
            .context("embedding batch returned no rows")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        let mut input_ids_flat = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask_flat = Vec::with_capacity(batch_size * seq_len);

        for encoding in &encodings {
            for &id in encoding.get_ids() {
                input_ids_flat.push(id as i64);
            }
            for &mask in encoding.get_attention_mask() {
                attention_mask_flat.push(mask as i64);
            }
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), input_ids_flat.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask_flat.clone().into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        // DistilBERT-family exports take no segment ids.
        let outputs = if self.token_type_ids {
            let token_type_ids = vec![0i64; batch_size * seq_len];
            let token_type_ids_tensor =
                Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
            session.run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            })?
        } else {
            session.run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
            })?
        };

        // Pooled output: shape [batch, D]
        if let Some(pooled) = outputs.get("sentence_embedding") {
            let (shape, data) = pooled
                .try_extract_tensor::<f32>()
                .context("failed to extract sentence_embedding tensor")?;
            let dims: &[i64] = &shape;
            anyhow::ensure!(
                dims.len() == 2 && dims[1] == self.dimensions as i64,
                "unexpected sentence_embedding shape: {dims:?}, expected [batch, {}]",
                self.dimensions
            );
            return Ok(data
                .chunks(self.dimensions)
                .map(|row| self.finish(row.to_vec()))
                .collect());
        }

        // Token embeddings: shape [batch, seq_len, D]
        let token_emb_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .context("failed to extract token_embeddings tensor")?;

        let dims: &[i64] = &shape;
        let pooled_dimensions = self.pooled_dimensions();
        anyhow::ensure!(
            dims.len() == 3 && dims[2] == pooled_dimensions as i64,
            "unexpected token_embeddings shape: {dims:?}, expected [batch, seq, {pooled_dimensions}]"
        );
        let hidden_dim = dims[2] as usize;
        let actual_seq_len = dims[1] as usize;

        let mut results = Vec::with_capacity(batch_size);
        for b in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_dim];
            let mut count = 0.0f32;

            for s in 0..actual_seq_len {
                let mask = attention_mask_flat[b * seq_len + s] as f32;
                if mask > 0.0 {
                    let offset = (b * actual_seq_len + s) * hidden_dim;
                    for d in 0..hidden_dim {
                        sum[d] += data[offset + d] * mask;
                    }
                    count += mask;
                }
            }

            if count > 0.0 {
                for d in 0..hidden_dim {
                    sum[d] /= count;
                }
            }

            results.push(self.finish_pooled(sum)?);
        }

        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let v = vec![3.0, 4.0];
        let normalized = l2_normalize(&v);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = vec![0.0, 0.0, 0.0];
        assert_eq!(l2_normalize(&v), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_model_files_are_reported() {
        let tmp = std::env::temp_dir().join("mediarec-no-model");
        let config = EmbeddingConfig {
            cache_dir: tmp.to_string_lossy().into_owned(),
            ..Default::default()
        };
        let err = LocalEmbeddingProvider::new(&config).err().unwrap();
        assert!(err.to_string().contains("model download"));
    }

    #[test]
    fn missing_dense_head_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("model.onnx"), b"").unwrap();
        std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();
        let config = EmbeddingConfig {
            cache_dir: tmp.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        let err = LocalEmbeddingProvider::new(&config).err().unwrap();
        assert!(err.to_string().contains("Dense head not found"), "got {err:#}");
        assert!(err.to_string().contains(DENSE_DIR));
    }

    fn test_config() -> EmbeddingConfig {
        EmbeddingConfig::default()
    }

    #[test]
    #[ignore] // Requires model files, run with: cargo test -- --ignored
    fn test_embed_has_configured_width() {
        let config = test_config();
        let provider = LocalEmbeddingProvider::new(&config).unwrap();
        let long = "una frase bastante larga ".repeat(200);
        for text in ["", "Hola mundo", long.as_str()] {
            let embedding = provider.embed(text).unwrap();
            assert_eq!(embedding.len(), config.dimensions);
        }
    }

    #[test]
    #[ignore]
    fn test_embed_consistency() {
        let provider = LocalEmbeddingProvider::new(&test_config()).unwrap();
        let emb1 = provider.embed("Quiero una aventura espacial").unwrap();
        let emb2 = provider.embed("Quiero una aventura espacial").unwrap();
        assert_eq!(emb1, emb2, "same input must produce identical output");
    }

    #[test]
    #[ignore]
    fn test_embed_batch() {
        let config = test_config();
        let provider = LocalEmbeddingProvider::new(&config).unwrap();
        let texts = vec!["Primera frase", "Second sentence", "Troisième phrase"];
        let embeddings = provider.embed_batch(&texts).unwrap();
        assert_eq!(embeddings.len(), 3);
        for emb in &embeddings {
            assert_eq!(emb.len(), config.dimensions);
        }
    }
}
