//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use chronicle_core::{
    config::CharacterSeed, EmbeddingService, GenerationRequest, GenerationService,
    HashEmbeddingService, MemoryStore, PromptSet, SqliteStore, World, WorldConfig,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Generator that replays canned responses in order, then returns ""
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> String {
        self.requests.lock().unwrap().push(request.clone());
        self.responses.lock().unwrap().pop_front().unwrap_or_default()
    }
}

/// Config for fast, bounded test runs with the given cast
pub fn test_config(names: &[&str], max_turns: Option<u64>) -> WorldConfig {
    let mut config = WorldConfig::default();
    config.world.turn_delay_secs = 0;
    config.world.max_turns = max_turns;
    config.characters = names
        .iter()
        .map(|name| CharacterSeed::new(*name, format!("{} keeps to themselves.", name)))
        .collect();
    config
}

/// Temp-file store with deterministic embeddings
pub async fn create_test_store() -> (Arc<dyn MemoryStore>, Arc<dyn EmbeddingService>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let embeddings: Arc<dyn EmbeddingService> = Arc::new(HashEmbeddingService::default());
    let store = SqliteStore::open(temp_dir.path().join("world.db"), embeddings.clone())
        .await
        .expect("Failed to create test store");
    (Arc::new(store), embeddings, temp_dir)
}

/// Bootstrapped world over the given store and generator
pub async fn create_test_world(
    config: WorldConfig,
    store: Arc<dyn MemoryStore>,
    embeddings: Arc<dyn EmbeddingService>,
    generator: Arc<ScriptedGenerator>,
) -> World {
    let world = World::from_parts(
        config,
        store,
        embeddings,
        generator,
        Arc::new(PromptSet::default()),
    );
    world.bootstrap().await.expect("Failed to bootstrap world");
    world
}
