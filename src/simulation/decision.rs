//! Decision step: one character, one generation call, one event
//!
//! The step is a small state machine:
//!
//! ```text
//! Prompting -> Generated -> Parsed -> Committed
//! ```
//!
//! Unusable output (no JSON object, or no string `narration`) takes the
//! fallback branch inside `Parsed`; it is never retried within the turn.

use crate::config::GenerationParams;
use crate::error::Result;
use crate::memory::DecisionContext;
use crate::prompts::{render, PromptSet};
use crate::services::{GenerationRequest, GenerationService};
use crate::simulation::extract::extract_first_json;
use crate::storage::MemoryStore;
use crate::types::{EventId, Turn};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const PREVIEW_CHARS: usize = 140;
const JSON_PRIMER: &str = "JSON:";

/// Narration used when the model gives nothing usable
pub fn placeholder_narration(name: &str) -> String {
    format!("{} pauses, lost in thought.", name)
}

/// A committed action
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub event_id: EventId,
    pub narration: String,
    pub payload: Value,
    pub used_fallback: bool,
    /// Raw generator output, kept for diagnostics
    pub raw: String,
}

#[derive(Debug)]
enum DecisionState {
    Prompting,
    Generated {
        raw: String,
    },
    Parsed {
        narration: String,
        payload: Value,
        used_fallback: bool,
        raw: String,
    },
    Committed(Decision),
}

/// Narration and payload read from raw output, or the fallback pair
pub fn parse_decision(name: &str, raw: &str) -> (String, Value, bool) {
    if let Some(object) = extract_first_json(raw) {
        if let Some(Value::String(narration)) = object.get("narration") {
            let narration = narration.trim().to_string();
            return (narration, Value::Object(object), false);
        }
    }

    let placeholder = placeholder_narration(name);
    let payload = json!({ "narration": placeholder });
    (placeholder, payload, true)
}

fn preview(raw: &str) -> String {
    raw.chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

pub struct DecisionStep {
    generator: Arc<dyn GenerationService>,
    store: Arc<dyn MemoryStore>,
    prompts: Arc<PromptSet>,
    params: GenerationParams,
}

impl DecisionStep {
    pub fn new(
        generator: Arc<dyn GenerationService>,
        store: Arc<dyn MemoryStore>,
        prompts: Arc<PromptSet>,
        params: GenerationParams,
    ) -> Self {
        Self {
            generator,
            store,
            prompts,
            params,
        }
    }

    /// Full decision prompt: context body, action request, then the primer
    pub fn prompt_for(&self, ctx: &DecisionContext) -> String {
        let request = render(&self.prompts.decide_action, &[("name", ctx.character.as_str())]);
        format!("{}\n\n{}\n\n{}", ctx.body, request, JSON_PRIMER)
    }

    /// Run the step to completion for `ctx.character` at `turn`.
    ///
    /// Only the final event write can fail.
    pub async fn decide(&self, turn: Turn, ctx: &DecisionContext) -> Result<Decision> {
        let name = ctx.character.as_str();
        let mut state = DecisionState::Prompting;

        loop {
            state = match state {
                DecisionState::Prompting => {
                    let request = GenerationRequest::new(self.prompt_for(ctx), &self.params);
                    let raw = self.generator.generate(&request).await;
                    debug!("{} raw output: {}", name, preview(&raw));
                    DecisionState::Generated { raw }
                }
                DecisionState::Generated { raw } => {
                    let (narration, payload, used_fallback) = parse_decision(name, &raw);
                    if used_fallback {
                        debug!("{} produced no usable decision, using placeholder", name);
                    }
                    DecisionState::Parsed {
                        narration,
                        payload,
                        used_fallback,
                        raw,
                    }
                }
                DecisionState::Parsed {
                    narration,
                    payload,
                    used_fallback,
                    raw,
                } => {
                    let event_id = self
                        .store
                        .record_event(turn, name, &narration, &payload)
                        .await?;
                    debug!("Turn {} {}: {}", turn, name, narration);
                    DecisionState::Committed(Decision {
                        event_id,
                        narration,
                        payload,
                        used_fallback,
                        raw,
                    })
                }
                DecisionState::Committed(decision) => return Ok(decision),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::test_support::{temp_store, ScriptedGenerator};

    fn context(name: &str) -> DecisionContext {
        DecisionContext {
            character: name.to_string(),
            recent: Vec::new(),
            facts: Vec::new(),
            reflection: format!("{} is a new inhabitant of the village.", name),
            body: format!("You are {}.", name),
        }
    }

    #[test]
    fn test_parse_embedded_object() {
        let raw = r#"Sure! {"narration": " Alice waves hello. ", "action": "wave"} Thanks."#;
        let (narration, payload, fallback) = parse_decision("Alice", raw);
        assert_eq!(narration, "Alice waves hello.");
        assert_eq!(payload["action"], "wave");
        assert!(!fallback);
    }

    #[test]
    fn test_parse_without_json_falls_back() {
        let (narration, payload, fallback) = parse_decision("Bob", "not json at all");
        assert_eq!(narration, "Bob pauses, lost in thought.");
        assert_eq!(payload, json!({"narration": "Bob pauses, lost in thought."}));
        assert!(fallback);
    }

    #[test]
    fn test_parse_non_string_narration_falls_back() {
        let (_, _, fallback) = parse_decision("Lira", r#"{"narration": 42}"#);
        assert!(fallback);
        let (_, _, fallback) = parse_decision("Lira", r#"{"action": "trade"}"#);
        assert!(fallback);
    }

    #[test]
    fn test_preview_flattens_and_caps() {
        let raw = format!("line one\nline two\r\n{}", "x".repeat(300));
        let p = preview(&raw);
        assert!(!p.contains('\n'));
        assert_eq!(p.chars().count(), PREVIEW_CHARS);
    }

    #[tokio::test]
    async fn test_decide_commits_event() {
        let (store, _embeddings, _temp) = temp_store().await.unwrap();
        let generator = Arc::new(ScriptedGenerator::new([
            r#"Sure! {"narration": "Alice waves hello."} Thanks."#,
        ]));
        let step = DecisionStep::new(
            generator.clone(),
            store.clone(),
            Arc::new(PromptSet::default()),
            GenerationParams::new(0.82, 450),
        );

        let decision = step.decide(1, &context("Alice")).await.unwrap();
        assert_eq!(decision.narration, "Alice waves hello.");
        assert!(!decision.used_fallback);

        let events = store.recent_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, decision.event_id);
        assert_eq!(events[0].turn, 1);
        assert_eq!(events[0].character, "Alice");
        assert_eq!(events[0].data, json!({"narration": "Alice waves hello."}));

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.starts_with("You are Alice."));
        assert!(requests[0].prompt.ends_with("\n\nJSON:"));
        assert_eq!(requests[0].max_tokens, 450);
    }

    #[tokio::test]
    async fn test_empty_generation_uses_placeholder_once() {
        let (store, _embeddings, _temp) = temp_store().await.unwrap();
        let generator = Arc::new(ScriptedGenerator::default());
        let step = DecisionStep::new(
            generator.clone(),
            store.clone(),
            Arc::new(PromptSet::default()),
            GenerationParams::new(0.82, 450),
        );

        let decision = step.decide(3, &context("Bob")).await.unwrap();
        assert!(decision.used_fallback);
        assert_eq!(decision.narration, "Bob pauses, lost in thought.");
        assert_eq!(generator.requests.lock().unwrap().len(), 1);
        assert_eq!(store.current_turn().await.unwrap(), 3);
    }
}
