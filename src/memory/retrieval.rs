//! Relevance retrieval over a character's long-term facts
//!
//! Scores every stored fact of one character against a natural-language
//! query and returns the best `k`. Both the query embedding and the stored
//! embeddings are unit vectors, so the dot product used here is cosine
//! similarity.

use crate::embeddings::{dot, normalize, EmbeddingService};
use crate::error::Result;
use crate::storage::MemoryStore;
use crate::types::ScoredFact;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

pub struct RelevanceRetriever {
    store: Arc<dyn MemoryStore>,
    embeddings: Arc<dyn EmbeddingService>,
    top_k: usize,
}

impl RelevanceRetriever {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embeddings: Arc<dyn EmbeddingService>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embeddings,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Top facts using the configured `k`
    pub async fn retrieve(&self, character: &str, query: &str) -> Result<Vec<ScoredFact>> {
        self.retrieve_k(character, query, self.top_k).await
    }

    /// Top `k` facts for `character`, best first.
    ///
    /// Exactly equal scores keep insertion order. A character without facts
    /// yields an empty list and the query is not embedded at all.
    pub async fn retrieve_k(
        &self,
        character: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredFact>> {
        let mut facts = self.store.facts_for(character).await?;
        if facts.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut query_embedding = self.embeddings.embed(query).await?;
        normalize(&mut query_embedding);

        facts.sort_by_key(|f| f.id);

        let mut scored: Vec<ScoredFact> = facts
            .into_iter()
            .map(|fact| {
                let score = dot(&query_embedding, &fact.embedding);
                let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
                ScoredFact { fact, score }
            })
            .collect();

        // sort_by is stable: ties stay in id order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        debug!(
            "Retrieved {} facts for {} (best score: {:?})",
            scored.len(),
            character,
            scored.first().map(|s| s.score)
        );

        Ok(scored)
    }
}
