//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait, a local implementation using
//! all-MiniLM-L6-v2 via ONNX Runtime, and the per-record [`cache`]. The
//! provider is created via [`create_provider`] from configuration.

pub mod cache;
pub mod local;

use anyhow::Result;

pub use cache::{cosine_similarity, EmbeddingCache, EmbeddingCacheEntry};

/// Trait for embedding text into vectors.
///
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Identifier of the loaded model. Cached vectors from another model are
    /// never reused.
    fn model_version(&self) -> &str;
}

/// Create an embedding provider from config. This is the model load step of
/// the resident service and may take a few seconds.
///
/// Currently only `"local"` is supported (ONNX Runtime + all-MiniLM-L6-v2).
/// Returns an error if model files are not found (run `lia model download`).
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
