//! Core data structures for the simulated world
//!
//! Three entity kinds are persisted: characters (with their reflection),
//! events (one narrated action per character per turn) and facts
//! (embeddable long-term memories).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulation step number. Turn 0 means "nothing has happened yet".
pub type Turn = u64;

/// Row identifier of an event; strictly increasing in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row identifier of a fact; strictly increasing in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactId(pub i64);

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A character and its persistent self-summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Identity string, unique across the world
    pub name: String,

    /// Free-text self-summary, rewritten by consolidation
    pub reflection: String,

    /// Turn at which the reflection was last accepted (0 = bootstrap)
    pub last_updated_turn: Turn,
}

/// One character's narrated action in one turn. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub turn: Turn,
    pub character: String,
    pub narration: String,

    /// Full decision payload as produced by the generation service
    pub data: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

/// Atomic long-term memory tied to one character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: FactId,
    pub character: String,
    pub text: String,
    pub importance: f32,

    /// Unit-length vector computed once at write time
    #[serde(skip)]
    pub embedding: Vec<f32>,

    pub turn: Turn,
}

/// A fact together with its similarity to a retrieval query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFact {
    pub fact: Fact,
    pub score: f32,
}

/// High-level counts for status output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldStats {
    pub current_turn: Turn,
    pub events: usize,
    pub facts: usize,
    pub characters: usize,
}
