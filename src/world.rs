//! Wiring of a world from configuration
//!
//! A [`World`] holds the shared handles (store, embedder, generator,
//! prompts) and builds the turn loop from them. Nothing here is global;
//! tests construct worlds from their own parts.

use crate::config::{CharacterSeed, WorldConfig};
use crate::embeddings::{self, EmbeddingService};
use crate::error::Result;
use crate::memory::{ContextAssembler, RelevanceRetriever};
use crate::prompts::PromptSet;
use crate::services::{GenerationService, KoboldService};
use crate::simulation::{ConsolidationScheduler, DecisionStep, RunFlag, TurnLoop};
use crate::storage::{MemoryStore, SqliteStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct World {
    config: WorldConfig,
    store: Arc<dyn MemoryStore>,
    embeddings: Arc<dyn EmbeddingService>,
    generator: Arc<dyn GenerationService>,
    prompts: Arc<PromptSet>,
}

impl World {
    /// Open the database at `db_path` with the configured embedder, generator
    /// and prompts
    pub async fn open(config: WorldConfig, db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let embeddings = embeddings::from_config(&config.embedding).await?;
        debug!(
            "Embedding backend: {} ({} dims)",
            embeddings.model_name(),
            embeddings.dimensions()
        );

        let store: Arc<dyn MemoryStore> =
            Arc::new(SqliteStore::open(db_path, embeddings.clone()).await?);
        let generator: Arc<dyn GenerationService> =
            Arc::new(KoboldService::new(&config.generation)?);
        let prompts = Arc::new(PromptSet::load(config.world.prompts_dir.as_deref())?);

        Ok(Self::from_parts(config, store, embeddings, generator, prompts))
    }

    pub fn from_parts(
        config: WorldConfig,
        store: Arc<dyn MemoryStore>,
        embeddings: Arc<dyn EmbeddingService>,
        generator: Arc<dyn GenerationService>,
        prompts: Arc<PromptSet>,
    ) -> Self {
        Self {
            config,
            store,
            embeddings,
            generator,
            prompts,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn MemoryStore> {
        self.store.clone()
    }

    /// Create the configured cast; existing characters are left untouched
    pub async fn bootstrap(&self) -> Result<usize> {
        seed_characters(self.store.as_ref(), &self.config.characters).await
    }

    pub fn turn_loop(&self, flag: RunFlag) -> TurnLoop {
        let cfg = &self.config;

        let retriever =
            RelevanceRetriever::new(self.store.clone(), self.embeddings.clone(), cfg.memory.top_k);
        let assembler = ContextAssembler::new(
            self.store.clone(),
            retriever,
            self.prompts.clone(),
            cfg.memory.recent_events,
        );
        let decision = DecisionStep::new(
            self.generator.clone(),
            self.store.clone(),
            self.prompts.clone(),
            cfg.generation.decision.clone(),
        );
        let consolidation = ConsolidationScheduler::new(
            self.generator.clone(),
            self.store.clone(),
            self.prompts.clone(),
            cfg.consolidation.clone(),
            cfg.generation.fact_extraction.clone(),
            cfg.generation.reflection.clone(),
            cfg.memory.fact_importance,
        );

        TurnLoop::new(
            self.store.clone(),
            assembler,
            decision,
            consolidation,
            Duration::from_secs(cfg.world.turn_delay_secs),
            cfg.world.max_turns,
            flag,
        )
    }
}

/// Insert any seed not already present. Returns how many were created.
pub async fn seed_characters(store: &dyn MemoryStore, seeds: &[CharacterSeed]) -> Result<usize> {
    let mut created = 0;
    for seed in seeds {
        if store
            .ensure_character(&seed.name, &seed.initial_reflection())
            .await?
        {
            created += 1;
        }
    }

    info!("{} characters ready ({} new)", seeds.len(), created);
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_characters;
    use crate::simulation::test_support::{temp_store, ScriptedGenerator};

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let (store, embeddings, _temp) = temp_store().await.unwrap();
        let world = World::from_parts(
            WorldConfig::with_default_characters(),
            store.clone(),
            embeddings,
            Arc::new(ScriptedGenerator::default()),
            Arc::new(PromptSet::default()),
        );

        assert_eq!(world.bootstrap().await.unwrap(), 3);
        store
            .update_reflection("Bob", "Bob has mellowed considerably over the winter.", 150)
            .await
            .unwrap();
        assert_eq!(world.bootstrap().await.unwrap(), 0);

        let names: Vec<_> = store
            .characters()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Lira"]);
        assert_eq!(
            store.character("Bob").await.unwrap().reflection,
            "Bob has mellowed considerably over the winter."
        );
    }

    #[tokio::test]
    async fn test_initial_reflection_text() {
        let (store, _embeddings, _temp) = temp_store().await.unwrap();
        seed_characters(store.as_ref(), &default_characters()).await.unwrap();

        let alice = store.character("Alice").await.unwrap();
        assert_eq!(
            alice.reflection,
            "Alice is a new inhabitant of the village. She is a curious 24-year-old adventurer who loves exploring."
        );
        assert_eq!(alice.last_updated_turn, 0);
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let db_path = temp.path().join("nested").join("world.db");
        let mut config = WorldConfig::with_default_characters();
        config.embedding.provider = crate::config::EmbeddingProvider::Hash;

        let world = World::open(config, &db_path).await.unwrap();
        world.bootstrap().await.unwrap();
        assert!(db_path.exists());
    }
}
