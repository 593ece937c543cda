//! Chronicle - a persistent, turn-based village of LLM-driven characters
//!
//! Every turn each character reads the shared recent history, the facts it
//! remembers best, and its own self-summary, then asks a text-generation
//! backend what it does next. Periodically the world distills experience
//! into long-term facts and rewrites each character's reflection.
//!
//! # Architecture
//!
//! - **Types**: characters, events, facts
//! - **Storage**: SQLite store behind the [`MemoryStore`] trait
//! - **Embeddings**: fastembed or deterministic hashing
//! - **Memory**: relevance retrieval and decision-context assembly
//! - **Simulation**: decision step, consolidation, turn loop
//! - **API**: read-only HTTP view
//!
//! # Example
//!
//! ```ignore
//! use chronicle_core::{RunFlag, World, WorldConfig};
//!
//! #[tokio::main]
//! async fn main() -> chronicle_core::Result<()> {
//!     let config = WorldConfig::from_file("chronicle.toml".as_ref())?;
//!     let world = World::open(config, "world.db".as_ref()).await?;
//!     world.bootstrap().await?;
//!
//!     let flag = RunFlag::new();
//!     world.turn_loop(flag.clone()).run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod memory;
pub mod prompts;
pub mod services;
pub mod simulation;
pub mod storage;
pub mod types;
pub mod world;

// Re-export commonly used types
pub use config::{CharacterSeed, WorldConfig};
pub use embeddings::{EmbeddingService, HashEmbeddingService, LocalEmbeddingService};
pub use error::{ChronicleError, Result};
pub use memory::{ContextAssembler, DecisionContext, RelevanceRetriever};
pub use prompts::PromptSet;
pub use services::{GenerationRequest, GenerationService, KoboldService};
pub use simulation::{
    extract_first_json, ConsolidationScheduler, Decision, DecisionStep, RunFlag, TurnLoop,
    TurnReport,
};
pub use storage::{MemoryStore, SqliteStore};
pub use types::{Character, Event, EventId, Fact, FactId, ScoredFact, Turn, WorldStats};
pub use world::World;
