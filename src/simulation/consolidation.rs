//! Periodic consolidation of short-term experience into long-term memory
//!
//! Two jobs run on fixed cadences keyed to the absolute turn number:
//! - fact extraction turns the latest action into durable facts
//! - reflection rewrite refreshes the character's self-summary
//!
//! Both are best effort. Poor model output stores nothing and leaves the
//! previous reflection in place.

use crate::config::{ConsolidationConfig, GenerationParams};
use crate::error::Result;
use crate::prompts::{render, PromptSet};
use crate::services::{GenerationRequest, GenerationService};
use crate::storage::MemoryStore;
use crate::types::{Character, Turn};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Characters stripped from both ends of every extracted fact line
const BULLET_CHARS: &[char] = &[
    ' ', '-', '*', '•', '·', '[', ']', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.',
];

/// What one consolidation pass stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub facts_recorded: usize,
    pub reflection_updated: bool,
}

/// Fact lines from a model response: bullets stripped, short lines dropped,
/// first letter capitalized
pub fn parse_fact_lines(response: &str, min_chars: usize) -> Vec<String> {
    response
        .lines()
        .map(|line| line.trim_matches(BULLET_CHARS))
        .filter(|line| line.chars().count() >= min_chars)
        .map(capitalize_first)
        .collect()
}

fn capitalize_first(line: &str) -> String {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A trimmed reflection candidate, if it is long enough to replace the old one
pub fn accept_reflection(candidate: &str, min_chars: usize) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.chars().count() > min_chars {
        Some(trimmed.to_string())
    } else {
        None
    }
}

pub struct ConsolidationScheduler {
    generator: Arc<dyn GenerationService>,
    store: Arc<dyn MemoryStore>,
    prompts: Arc<PromptSet>,
    config: ConsolidationConfig,
    fact_params: GenerationParams,
    reflection_params: GenerationParams,
    fact_importance: f32,
}

impl ConsolidationScheduler {
    pub fn new(
        generator: Arc<dyn GenerationService>,
        store: Arc<dyn MemoryStore>,
        prompts: Arc<PromptSet>,
        config: ConsolidationConfig,
        fact_params: GenerationParams,
        reflection_params: GenerationParams,
        fact_importance: f32,
    ) -> Self {
        Self {
            generator,
            store,
            prompts,
            config,
            fact_params,
            reflection_params,
            fact_importance,
        }
    }

    pub fn fact_extraction_due(&self, turn: Turn) -> bool {
        is_due(turn, self.config.fact_interval)
    }

    pub fn reflection_due(&self, turn: Turn) -> bool {
        is_due(turn, self.config.reflection_interval)
    }

    /// Run whichever jobs are due for `character` at `turn`.
    ///
    /// `recent` is the recency block shown to the extraction prompt, or
    /// "none". Embedding failures skip the affected fact; storage failures
    /// are returned.
    pub async fn consolidate(
        &self,
        turn: Turn,
        character: &Character,
        narration: &str,
        recent: &str,
    ) -> Result<ConsolidationReport> {
        let mut report = ConsolidationReport::default();

        if self.fact_extraction_due(turn) {
            report.facts_recorded = self.extract_facts(turn, character, narration, recent).await?;
        }

        if self.reflection_due(turn) {
            report.reflection_updated = self.rewrite_reflection(turn, character).await?;
        }

        Ok(report)
    }

    async fn extract_facts(
        &self,
        turn: Turn,
        character: &Character,
        narration: &str,
        recent: &str,
    ) -> Result<usize> {
        let prompt = render(
            &self.prompts.extract_facts,
            &[
                ("name", character.name.as_str()),
                ("narration", narration),
                ("recent", recent),
            ],
        );
        let response = self
            .generator
            .generate(&GenerationRequest::new(prompt, &self.fact_params))
            .await;

        let mut recorded = 0;
        for fact in parse_fact_lines(&response, self.config.min_fact_chars) {
            match self
                .store
                .record_fact(&character.name, &fact, self.fact_importance, turn)
                .await
            {
                Ok(id) => {
                    debug!("Recorded fact {} for {}: {}", id, character.name, fact);
                    recorded += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Skipping fact for {}: {}", character.name, e),
            }
        }

        if recorded > 0 {
            info!("Turn {}: {} new facts for {}", turn, recorded, character.name);
        }
        Ok(recorded)
    }

    async fn rewrite_reflection(&self, turn: Turn, character: &Character) -> Result<bool> {
        let prompt = render(
            &self.prompts.update_reflection,
            &[
                ("name", character.name.as_str()),
                ("reflection", character.reflection.as_str()),
            ],
        );
        let response = self
            .generator
            .generate(&GenerationRequest::new(prompt, &self.reflection_params))
            .await;

        match accept_reflection(&response, self.config.min_reflection_chars) {
            Some(reflection) => {
                self.store
                    .update_reflection(&character.name, &reflection, turn)
                    .await?;
                info!("Turn {}: {} updated their reflection", turn, character.name);
                Ok(true)
            }
            None => {
                debug!(
                    "Turn {}: reflection for {} rejected ({} chars)",
                    turn,
                    character.name,
                    response.trim().chars().count()
                );
                Ok(false)
            }
        }
    }
}

fn is_due(turn: Turn, interval: u64) -> bool {
    interval > 0 && turn > 0 && turn % interval == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::test_support::{temp_store, ScriptedGenerator};

    fn scheduler(
        generator: Arc<ScriptedGenerator>,
        store: Arc<dyn MemoryStore>,
    ) -> ConsolidationScheduler {
        ConsolidationScheduler::new(
            generator,
            store,
            Arc::new(PromptSet::default()),
            ConsolidationConfig::default(),
            GenerationParams::new(0.2, 200),
            GenerationParams::new(0.7, 350),
            7.0,
        )
    }

    async fn seeded(store: &Arc<dyn MemoryStore>, name: &str) -> Character {
        store
            .ensure_character(name, &format!("{} is a new inhabitant of the village.", name))
            .await
            .unwrap();
        store.character(name).await.unwrap()
    }

    #[test]
    fn test_parse_fact_lines() {
        let response = "1. alice owns a silver sword\n- Bob is kind\n* [3] short\n\n  • Lira trades spices for gold.  ";
        assert_eq!(
            parse_fact_lines(response, 15),
            vec![
                "Alice owns a silver sword".to_string(),
                "Lira trades spices for gold".to_string(),
            ]
        );
    }

    #[test]
    fn test_fact_minimum_is_inclusive() {
        assert_eq!(parse_fact_lines("abcdefghijklmno", 15), vec!["Abcdefghijklmno"]);
        assert!(parse_fact_lines("abcdefghijklmn", 15).is_empty());
    }

    #[test]
    fn test_capitalize_keeps_rest() {
        assert_eq!(capitalize_first("élan of the Elves"), "Élan of the Elves");
    }

    #[test]
    fn test_accept_reflection_minimum() {
        assert_eq!(accept_reflection("   ", 60), None);
        assert_eq!(accept_reflection(&"a".repeat(60), 60), None);
        let long = format!("  {}  ", "a".repeat(61));
        assert_eq!(accept_reflection(&long, 60), Some("a".repeat(61)));
    }

    #[test]
    fn test_cadence_uses_absolute_turn() {
        let d = |t| is_due(t, 15);
        assert!(!d(0));
        assert!(!d(14));
        assert!(d(15));
        assert!(d(30));
        assert!(!is_due(15, 0));
    }

    #[tokio::test]
    async fn test_off_cadence_makes_no_calls() {
        let (store, _embeddings, _temp) = temp_store().await.unwrap();
        let generator = Arc::new(ScriptedGenerator::default());
        let sched = scheduler(generator.clone(), store.clone());
        let alice = seeded(&store, "Alice").await;

        let report = sched.consolidate(7, &alice, "Alice waves.", "none").await.unwrap();
        assert_eq!(report, ConsolidationReport::default());
        assert!(generator.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fact_extraction_records_survivors() {
        let (store, _embeddings, _temp) = temp_store().await.unwrap();
        let generator = Arc::new(ScriptedGenerator::new([
            "- alice owns a silver sword\n- ok\n- Alice distrusts the merchant Lira",
        ]));
        let sched = scheduler(generator.clone(), store.clone());
        let alice = seeded(&store, "Alice").await;

        let report = sched
            .consolidate(15, &alice, "Alice buys a sword.", "none")
            .await
            .unwrap();
        assert_eq!(report.facts_recorded, 2);
        assert!(!report.reflection_updated);

        let facts = store.facts_for("Alice").await.unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].text, "Alice owns a silver sword");
        assert_eq!(facts[0].turn, 15);
        assert_eq!(facts[0].importance, 7.0);

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests[0].temperature, 0.2);
        assert!(requests[0].prompt.contains("Alice buys a sword."));
    }

    #[tokio::test]
    async fn test_reflection_rewrite_accepted_and_rejected() {
        let (store, _embeddings, _temp) = temp_store().await.unwrap();
        let summary = "Alice has become the village's most trusted scout and now guards the north road.";
        let generator = Arc::new(ScriptedGenerator::new(["", summary, "too short"]));
        let config = ConsolidationConfig {
            reflection_interval: 15,
            ..Default::default()
        };
        let sched = ConsolidationScheduler::new(
            generator.clone(),
            store.clone(),
            Arc::new(PromptSet::default()),
            config,
            GenerationParams::new(0.2, 200),
            GenerationParams::new(0.7, 350),
            7.0,
        );
        let alice = seeded(&store, "Alice").await;

        // turn 15: facts (empty response) then reflection (accepted)
        let report = sched.consolidate(15, &alice, "Alice scouts.", "none").await.unwrap();
        assert_eq!(report.facts_recorded, 0);
        assert!(report.reflection_updated);
        let updated = store.character("Alice").await.unwrap();
        assert_eq!(updated.reflection, summary);
        assert_eq!(updated.last_updated_turn, 15);

        // turn 30: "too short" is dropped as a fact, then the reflection gets ""
        let report = sched.consolidate(30, &updated, "Alice rests.", "none").await.unwrap();
        assert!(!report.reflection_updated);
        let unchanged = store.character("Alice").await.unwrap();
        assert_eq!(unchanged.reflection, summary);
        assert_eq!(unchanged.last_updated_turn, 15);
    }
}
