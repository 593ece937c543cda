//! Storage layer for the simulated world
//!
//! The store owns characters, events and facts. It is append/overwrite-only:
//! events and facts are never updated or removed, and a character row is only
//! ever rewritten in place. Retrieval and recency reasoning rely on that
//! monotonic growth.

pub mod sqlite;

use crate::error::Result;
use crate::types::{Character, Event, EventId, Fact, FactId, Turn, WorldStats};
use async_trait::async_trait;

pub use sqlite::SqliteStore;

/// Storage backend trait defining all required operations
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Create a character if it does not exist yet. Returns true when created.
    async fn ensure_character(&self, name: &str, initial_reflection: &str) -> Result<bool>;

    /// All characters, in creation order
    async fn characters(&self) -> Result<Vec<Character>>;

    /// A single character by name
    async fn character(&self, name: &str) -> Result<Character>;

    /// Overwrite a character's reflection
    async fn update_reflection(&self, name: &str, reflection: &str, turn: Turn) -> Result<()>;

    /// Append an event
    async fn record_event(
        &self,
        turn: Turn,
        character: &str,
        narration: &str,
        data: &serde_json::Value,
    ) -> Result<EventId>;

    /// The most recent `limit` events, oldest first
    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>>;

    /// Highest turn with a recorded event, or 0
    async fn current_turn(&self) -> Result<Turn>;

    /// Embed and append a fact
    async fn record_fact(
        &self,
        character: &str,
        text: &str,
        importance: f32,
        turn: Turn,
    ) -> Result<FactId>;

    /// Every fact recorded for a character
    async fn facts_for(&self, character: &str) -> Result<Vec<Fact>>;

    /// Number of recorded events
    async fn event_count(&self) -> Result<usize>;

    /// Number of facts recorded for a character
    async fn fact_count(&self, character: &str) -> Result<usize>;

    /// Row counts and current turn
    async fn stats(&self) -> Result<WorldStats>;
}
