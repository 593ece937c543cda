//! Decision context assembly
//!
//! Each turn a character sees three blocks: what recently happened in the
//! shared world, the long-term facts most relevant to it, and its own
//! reflection. The recency window is the only truncation applied here;
//! unbounded fact growth is handled by the retriever's top-k.

use crate::error::Result;
use crate::memory::RelevanceRetriever;
use crate::prompts::{render, PromptSet};
use crate::storage::MemoryStore;
use crate::types::{Character, Event, ScoredFact};
use std::sync::Arc;

/// Placed in the recency block when no event has been recorded yet
pub const WORLD_BEGINS: &str = "The world has just begun.";

const RECENT_HEADER: &str = "Recent events:";
const FACTS_HEADER: &str = "Important facts you must never forget:";

/// Placed in the relevance block when the character has no facts yet, so it
/// is never confused with an omitted section
pub const NO_FACTS: &str = "(no long-term memories yet)";

/// Retrieval query naming what a character should keep in mind
pub fn relevance_query(name: &str) -> String {
    format!(
        "{}'s current goals, relationships, possessions and key memories",
        name
    )
}

/// Everything a character knows at the start of its action
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub character: String,
    /// Narrations in the recency window, oldest first
    pub recent: Vec<String>,
    pub facts: Vec<ScoredFact>,
    pub reflection: String,
    /// Rendered system prompt combining the three blocks
    pub body: String,
}

impl DecisionContext {
    pub fn recency_block(&self) -> String {
        recency_block(&self.recent)
    }

    pub fn relevance_block(&self) -> String {
        relevance_block(&self.facts)
    }

    /// Recency block for consolidation prompts; "none" before anything happened
    pub fn recent_or_none(&self) -> String {
        if self.recent.is_empty() {
            "none".to_string()
        } else {
            recency_block(&self.recent)
        }
    }
}

fn recency_block(recent: &[String]) -> String {
    if recent.is_empty() {
        return WORLD_BEGINS.to_string();
    }
    format!("{}\n{}", RECENT_HEADER, recent.join("\n"))
}

fn relevance_block(facts: &[ScoredFact]) -> String {
    if facts.is_empty() {
        return format!("{}\n{}", FACTS_HEADER, NO_FACTS);
    }

    let lines: Vec<String> = facts.iter().map(|s| format!("- {}", s.fact.text)).collect();
    format!("{}\n{}", FACTS_HEADER, lines.join("\n"))
}

/// Narrations of the given events, skipping empty ones
pub fn recent_lines(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.narration.clone())
        .filter(|n| !n.is_empty())
        .collect()
}

pub struct ContextAssembler {
    store: Arc<dyn MemoryStore>,
    retriever: RelevanceRetriever,
    prompts: Arc<PromptSet>,
    recent_limit: usize,
}

impl ContextAssembler {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        retriever: RelevanceRetriever,
        prompts: Arc<PromptSet>,
        recent_limit: usize,
    ) -> Self {
        Self {
            store,
            retriever,
            prompts,
            recent_limit,
        }
    }

    pub async fn assemble(&self, character: &Character) -> Result<DecisionContext> {
        let events = self.store.recent_events(self.recent_limit).await?;
        let recent = recent_lines(&events);

        let facts = self
            .retriever
            .retrieve(&character.name, &relevance_query(&character.name))
            .await?;

        let reflection = character.reflection.trim().to_string();

        let facts_block = relevance_block(&facts);
        let recent_block = recency_block(&recent);
        let body = render(
            &self.prompts.system,
            &[
                ("name", character.name.as_str()),
                ("reflection", reflection.as_str()),
                ("facts", facts_block.as_str()),
                ("recent", recent_block.as_str()),
            ],
        );

        Ok(DecisionContext {
            character: character.name.clone(),
            recent,
            facts,
            reflection,
            body,
        })
    }
}
