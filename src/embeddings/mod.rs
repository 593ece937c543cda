//! Embedding generation services for fact retrieval
//!
//! Provides a local (fastembed) backend and a deterministic hashing backend.
//!
//! Relevance scoring is a plain dot product. That equals cosine similarity
//! only when both operands have unit length, so every vector that enters the
//! store or a query goes through [`normalize`] first. Skipping that step with
//! a backend that does not normalize its own output would rank facts by
//! magnitude as much as by meaning.

pub mod hash;
pub mod local;

pub use hash::HashEmbeddingService;
pub use local::LocalEmbeddingService;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Embedding service trait defining required operations
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimensionality
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Build the backend selected in configuration
pub async fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingService>> {
    match config.provider {
        EmbeddingProvider::Local => Ok(Arc::new(LocalEmbeddingService::new(config.clone()).await?)),
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbeddingService::new(config.hash_dimensions))),
    }
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        vector.iter_mut().for_each(|x| *x /= magnitude);
    }
}

/// Dot product; 0.0 when the lengths differ
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
