//! Prompt templates for the decision and consolidation calls
//!
//! Templates use `{key}` placeholders. Only the keys passed to [`render`]
//! are substituted, so literal braces (such as a JSON example) pass through
//! untouched.

use crate::error::Result;
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_SYSTEM: &str = "\
You are {name}, a resident of a small village in a living, persistent world.

Who you are:
{reflection}

{facts}

{recent}";

const DEFAULT_DECIDE_ACTION: &str = "\
Decide what {name} does next. Stay in character and keep it to one or two sentences.
Respond with a single JSON object on one line, shaped like this:
{\"narration\": \"<what {name} does, written in third person>\", \"action\": \"<short verb phrase>\", \"target\": \"<person, place or thing, or null>\"}";

const DEFAULT_EXTRACT_FACTS: &str = "\
List the important long-term facts about {name} that follow from the events below: \
goals, relationships, possessions, places and promises.

Latest action by {name}:
{narration}

{recent}

Write one fact per line as a short, complete sentence.";

const DEFAULT_UPDATE_REFLECTION: &str = "\
This is {name}'s current self-summary:
{reflection}

Rewrite it as an updated self-summary of {name} in three to five sentences. \
Keep what still matters and say how {name} has changed. Reply with the summary only.";

/// The four templates a world needs
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    pub system: String,
    pub decide_action: String,
    pub extract_facts: String,
    pub update_reflection: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM.to_string(),
            decide_action: DEFAULT_DECIDE_ACTION.to_string(),
            extract_facts: DEFAULT_EXTRACT_FACTS.to_string(),
            update_reflection: DEFAULT_UPDATE_REFLECTION.to_string(),
        }
    }
}

impl PromptSet {
    /// Built-in templates, overridden by `system.txt`, `decide_action.txt`,
    /// `extract_facts.txt` and `update_reflection.txt` found in `dir`
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut prompts = Self::default();

        let Some(dir) = dir else {
            return Ok(prompts);
        };

        info!("Loading prompt overrides from {}", dir.display());

        for (file, slot) in [
            ("system.txt", &mut prompts.system),
            ("decide_action.txt", &mut prompts.decide_action),
            ("extract_facts.txt", &mut prompts.extract_facts),
            ("update_reflection.txt", &mut prompts.update_reflection),
        ] {
            let path = dir.join(file);
            if path.is_file() {
                *slot = std::fs::read_to_string(&path)?;
                debug!("Loaded prompt override {}", path.display());
            }
        }

        Ok(prompts)
    }
}

/// Substitute `{key}` placeholders in a single pass; substituted values are
/// never rescanned
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let hit = vars.iter().find(|(key, _)| {
            after.starts_with(key) && after[key.len()..].starts_with('}')
        });

        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_replaces_known_keys_only() {
        let out = render("{name} says {\"a\": 1} to {other}", &[("name", "Bob")]);
        assert_eq!(out, "Bob says {\"a\": 1} to {other}");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render("{a} {b}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(out, "{b} x");
    }

    #[test]
    fn test_render_repeated_key() {
        assert_eq!(render("{x}-{x}", &[("x", "7")]), "7-7");
    }

    #[test]
    fn test_default_decide_prompt_keeps_json_example() {
        let out = render(&PromptSet::default().decide_action, &[("name", "Lira")]);
        assert!(out.contains("{\"narration\": \"<what Lira does"));
    }

    #[test]
    fn test_load_without_dir_is_default() {
        assert_eq!(PromptSet::load(None).unwrap(), PromptSet::default());
    }

    #[test]
    fn test_load_partial_overrides() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("system.txt"), "custom {name}").unwrap();

        let prompts = PromptSet::load(Some(dir.path())).unwrap();
        assert_eq!(prompts.system, "custom {name}");
        assert_eq!(prompts.extract_facts, PromptSet::default().extract_facts);
    }
}
