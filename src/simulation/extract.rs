//! First-JSON-object extraction from untrusted model output
//!
//! Model output may wrap the decision in prose, emit several JSON-looking
//! fragments, or none at all. The scanner walks the text left to right as a
//! small automaton:
//!
//! - `Outside`: looking for `{`; stray `}` and quotes are ignored.
//! - `Inside`: tracking brace depth from the candidate's opening brace.
//!   Braces inside JSON string literals do not count.
//!
//! When depth returns to zero the candidate is handed to serde_json. The
//! first candidate that parses as an object wins. A candidate that does not
//! parse, or is still open when the text ends, restarts the scan one byte
//! past its opening brace, so a stray quote in leading prose cannot hide a
//! later object. Every restart moves strictly forward and the scan never
//! recurses.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    Inside {
        start: usize,
        depth: usize,
        in_string: bool,
        escaped: bool,
    },
}

/// The first complete, parseable JSON object in `text`, if any
pub fn extract_first_json(text: &str) -> Option<Map<String, Value>> {
    let mut resume = 0;

    'scan: loop {
        let mut state = ScanState::Outside;

        for (offset, ch) in text[resume..].char_indices() {
            let i = resume + offset;
            state = match state {
                ScanState::Outside => {
                    if ch == '{' {
                        ScanState::Inside {
                            start: i,
                            depth: 1,
                            in_string: false,
                            escaped: false,
                        }
                    } else {
                        ScanState::Outside
                    }
                }

                ScanState::Inside {
                    start,
                    depth,
                    in_string: true,
                    escaped,
                } => ScanState::Inside {
                    start,
                    depth,
                    in_string: escaped || ch != '"',
                    escaped: !escaped && ch == '\\',
                },

                ScanState::Inside {
                    start,
                    depth,
                    in_string: false,
                    ..
                } => match ch {
                    '"' => ScanState::Inside {
                        start,
                        depth,
                        in_string: true,
                        escaped: false,
                    },
                    '{' => ScanState::Inside {
                        start,
                        depth: depth + 1,
                        in_string: false,
                        escaped: false,
                    },
                    '}' if depth == 1 => {
                        if let Ok(Value::Object(map)) = serde_json::from_str(&text[start..=i]) {
                            return Some(map);
                        }
                        // `{` is one byte, so this stays on a char boundary
                        resume = start + 1;
                        continue 'scan;
                    }
                    '}' => ScanState::Inside {
                        start,
                        depth: depth - 1,
                        in_string: false,
                        escaped: false,
                    },
                    _ => state,
                },
            };
        }

        match state {
            ScanState::Inside { start, .. } => resume = start + 1,
            ScanState::Outside => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn extracted(text: &str) -> Option<Value> {
        extract_first_json(text).map(Value::Object)
    }

    #[test]
    fn test_object_surrounded_by_prose() {
        let text = r#"Sure! {"narration": "Alice waves hello."} Thanks."#;
        assert_eq!(
            extracted(text),
            Some(json!({"narration": "Alice waves hello."}))
        );
    }

    #[test]
    fn test_first_of_several_candidates() {
        let text = r#"{"narration": "first"} and then {"narration": "second"}"#;
        assert_eq!(extracted(text), Some(json!({"narration": "first"})));
    }

    #[test]
    fn test_nested_object() {
        let text = r#"JSON: {"narration": "Bob works", "meta": {"mood": {"level": 2}}} trailing }"#;
        assert_eq!(
            extracted(text),
            Some(json!({"narration": "Bob works", "meta": {"mood": {"level": 2}}}))
        );
    }

    #[test]
    fn test_invalid_candidate_is_skipped() {
        let text = r#"{not json at all} {"narration": "ok"}"#;
        assert_eq!(extracted(text), Some(json!({"narration": "ok"})));
    }

    #[test]
    fn test_stray_quote_in_failed_candidate() {
        let text = r#"Thinking {he said "wait} then: {"narration": "ok"}"#;
        assert_eq!(extracted(text), Some(json!({"narration": "ok"})));
    }

    #[test]
    fn test_unterminated_candidate_before_object() {
        let text = r#"{"a": 1 ... {"narration": "ok"}"#;
        assert_eq!(extracted(text), Some(json!({"narration": "ok"})));
    }

    #[test]
    fn test_object_nested_in_invalid_candidate() {
        let text = r#"{oops {"narration": "inner"} still oops}"#;
        assert_eq!(extracted(text), Some(json!({"narration": "inner"})));
    }

    #[test]
    fn test_braces_inside_strings_do_not_count() {
        let text = r#"{"narration": "Lira draws } and { in the sand \"}\""} rest"#;
        assert_eq!(
            extracted(text),
            Some(json!({"narration": "Lira draws } and { in the sand \"}\""}))
        );
    }

    #[test]
    fn test_stray_closing_brace_before_object() {
        let text = r#"}} oops {"narration": "fine"}"#;
        assert_eq!(extracted(text), Some(json!({"narration": "fine"})));
    }

    #[test]
    fn test_no_braces() {
        assert_eq!(extracted("not json at all"), None);
        assert_eq!(extracted(""), None);
    }

    #[test]
    fn test_unbalanced_is_absent() {
        assert_eq!(extracted(r#"{"narration": "cut off"#), None);
        assert_eq!(extracted("{{{{"), None);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "Élan «{\"narration\": \"Lira sourit 🙂\"}» fin";
        assert_eq!(extracted(text), Some(json!({"narration": "Lira sourit 🙂"})));
    }

    proptest! {
        #[test]
        fn prop_first_embedded_object_is_found(
            prefix in prop::collection::vec(
                prop_oneof![
                    Just(r#"{he said "wait}"#.to_string()),
                    Just("{not json at all}".to_string()),
                    Just("}}".to_string()),
                    Just("\"".to_string()),
                    Just(r#"{"a": 1 oops"#.to_string()),
                    "[^{}]{0,8}",
                ],
                0..6,
            ),
            suffix in "\\PC{0,40}",
            narration in "\\PC{0,30}",
            extra in prop::collection::btree_map("[a-z]{1,8}", "\\PC{0,12}", 0..4),
        ) {
            let mut object = Map::new();
            object.insert("narration".to_string(), Value::String(narration));
            for (k, v) in extra {
                object.entry(k).or_insert(Value::String(v));
            }
            let encoded = serde_json::to_string(&Value::Object(object.clone())).unwrap();
            let text = format!(
                "{}{}{}{{\"second\": true}}",
                prefix.concat(),
                encoded,
                suffix
            );

            prop_assert_eq!(extract_first_json(&text), Some(object));
        }

        #[test]
        fn prop_text_without_braces_is_absent(text in "[^{}]{0,200}") {
            prop_assert_eq!(extract_first_json(&text), None);
        }
    }
}
