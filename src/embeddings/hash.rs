//! Deterministic embedding service based on token hashing
//!
//! Each lowercase alphanumeric token is hashed (FNV-1a) into one of
//! `dimensions` buckets with a sign taken from the hash, and the resulting
//! bag-of-tokens vector is normalized. Texts that share words score higher,
//! identical texts always produce identical vectors, and nothing has to be
//! downloaded. Used for offline runs and tests.

use crate::embeddings::{normalize, EmbeddingService};
use crate::error::{ChronicleError, Result};
use async_trait::async_trait;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashEmbeddingService {
    dimensions: usize,
}

impl HashEmbeddingService {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn fnv1a(token: &str) -> u64 {
        token.bytes().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        })
    }

    /// Synchronous core, shared with callers that are not async
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(ChronicleError::Embedding(
                "hash embedding dimensions must be greater than 0".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = Self::fnv1a(&token.to_lowercase());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        Ok(vector)
    }
}

impl Default for HashEmbeddingService {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingService for HashEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_sync(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "fnv1a-token-hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::dot;

    #[tokio::test]
    async fn test_deterministic() {
        let service = HashEmbeddingService::default();
        let a = service.embed("Alice owns a sword").await.unwrap();
        let b = service.embed("Alice owns a sword").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
    }

    #[tokio::test]
    async fn test_unit_length() {
        let service = HashEmbeddingService::new(64);
        let v = service.embed("Bob forges a horseshoe").await.unwrap();
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let service = HashEmbeddingService::default();
        let query = service.embed("Alice sword").await.unwrap();
        let related = service.embed("Alice owns a sword").await.unwrap();
        let unrelated = service.embed("Bob bakes bread daily").await.unwrap();
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let service = HashEmbeddingService::new(8);
        let v = service.embed("   ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let service = HashEmbeddingService::new(0);
        assert!(matches!(
            service.embed_sync("anything"),
            Err(ChronicleError::Embedding(_))
        ));
    }
}
