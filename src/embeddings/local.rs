//! Local embedding service using fastembed
//!
//! Runs a sentence-embedding model in-process via ONNX Runtime. Models are
//! downloaded on first use to the cache directory and loaded from cache on
//! subsequent runs.

use crate::config::EmbeddingConfig;
use crate::embeddings::{normalize, EmbeddingService};
use crate::error::{ChronicleError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{debug, info};

/// Local embedding service using fastembed
pub struct LocalEmbeddingService {
    /// fastembed needs `&mut self` to embed, so the model sits behind a mutex
    model: Arc<Mutex<TextEmbedding>>,
    config: EmbeddingConfig,
    dimensions: usize,
}

impl LocalEmbeddingService {
    /// Load (and if necessary download) the configured model
    ///
    /// # Example
    /// ```ignore
    /// let service = LocalEmbeddingService::new(EmbeddingConfig::default()).await?;
    /// let embedding = service.embed("Alice owns a sword").await?;
    /// ```
    pub async fn new(config: EmbeddingConfig) -> Result<Self> {
        info!(
            "Initializing local embedding service: model={}, cache={:?}",
            config.model, config.cache_dir
        );

        let embedding_model = Self::model_name_to_enum(&config.model)?;

        let mut init_options = InitOptions::new(embedding_model)
            .with_show_download_progress(config.show_download_progress);
        if let Some(cache_dir) = config.cache_dir.clone() {
            init_options = init_options.with_cache_dir(cache_dir);
        }

        // Load model in blocking task (may download if not cached)
        let model = task::spawn_blocking(move || TextEmbedding::try_new(init_options))
            .await
            .map_err(|e| ChronicleError::Other(format!("Task join error: {}", e)))?
            .map_err(|e| ChronicleError::Embedding(format!("Failed to load model: {}", e)))?;

        let dimensions = config.dimensions();

        info!(
            "Local embedding service initialized: {} dimensions",
            dimensions
        );

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            config,
            dimensions,
        })
    }

    /// Map model name string to fastembed's EmbeddingModel enum
    fn model_name_to_enum(model_name: &str) -> Result<EmbeddingModel> {
        match model_name {
            "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "all-MiniLM-L12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
            "nomic-embed-text-v1" => Ok(EmbeddingModel::NomicEmbedTextV1),
            "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
            _ => Err(ChronicleError::Embedding(format!(
                "Unsupported model: '{}'",
                model_name
            ))),
        }
    }
}

#[async_trait]
impl EmbeddingService for LocalEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(ChronicleError::Embedding(
                "Text cannot be empty".to_string(),
            ));
        }

        debug!("Embedding text ({} chars)", text.len());

        let model = Arc::clone(&self.model);
        let texts = vec![text.to_string()];

        // fastembed is synchronous
        let mut embeddings = task::spawn_blocking(move || {
            let mut model_guard = model
                .lock()
                .map_err(|e| format!("Mutex lock failed: {}", e))?;

            model_guard
                .embed(texts, None)
                .map_err(|e| format!("Embedding generation failed: {}", e))
        })
        .await
        .map_err(|e| ChronicleError::Other(format!("Task join error: {}", e)))?
        .map_err(ChronicleError::Embedding)?;

        let mut embedding = embeddings
            .pop()
            .ok_or_else(|| ChronicleError::Embedding("No embedding returned".to_string()))?;

        if embedding.len() != self.dimensions {
            return Err(ChronicleError::Embedding(format!(
                "Embedding has wrong dimensions: expected {}, got {}",
                self.dimensions,
                embedding.len()
            )));
        }

        normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_mapping() {
        assert!(LocalEmbeddingService::model_name_to_enum("all-MiniLM-L6-v2").is_ok());
        assert!(LocalEmbeddingService::model_name_to_enum("bge-base-en-v1.5").is_ok());
        assert!(LocalEmbeddingService::model_name_to_enum("invalid-model").is_err());
    }

    #[test]
    fn test_default_model_dimensions() {
        assert_eq!(EmbeddingConfig::default().dimensions(), 384);
    }

    // Downloads the model; run explicitly with `--ignored`
    #[tokio::test]
    #[ignore]
    async fn test_embed_is_normalized() {
        let service = LocalEmbeddingService::new(EmbeddingConfig::default())
            .await
            .unwrap();

        let embedding = service.embed("Alice waves hello.").await.unwrap();
        assert_eq!(embedding.len(), 384);

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-4);
    }
}
