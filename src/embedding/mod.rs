//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait, a local ONNX implementation, and
//! [`embed_query`], which shapes a single text into the `(1, D)` matrix the
//! neighbor search consumes.

pub mod dense;
pub mod local;

use anyhow::Result;
use ndarray::Array2;

/// Trait for embedding text into vectors.
///
/// All methods are synchronous. Callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize;
}

/// Embed `text` as a single-row matrix of shape `(1, D)`.
///
/// Fails if the provider returns a vector whose width differs from its
/// declared [`EmbeddingProvider::dimensions`].
pub fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Array2<f32>> {
    let vector = provider.embed(text)?;
    anyhow::ensure!(
        vector.len() == provider.dimensions(),
        "provider returned {} dimensions, declared {}",
        vector.len(),
        provider.dimensions()
    );
    let encoding = Array2::from_shape_vec((1, vector.len()), vector)?;
    tracing::debug!(shape = ?encoding.shape(), "query encoded");
    Ok(encoding)
}

/// Create an embedding provider from config.
///
/// Currently only `"local"` is supported (ONNX Runtime).
/// Returns an error if model files are not found. Run `mediarec model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}
