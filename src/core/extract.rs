//! Recovery of a worker's structured result from its combined output.
//!
//! Workers interleave log lines with exactly one final JSON object, either
//! wrapped in explicit markers or printed as the last object-shaped line.
//! Extraction tries a fixed, ordered list of pure strategies and stops at the
//! first that yields an object. The same text always yields the same result.

use serde_json::Value;

pub const RESULT_START_MARKER: &str = "JSON_RESPONSE_START";
pub const RESULT_END_MARKER: &str = "JSON_RESPONSE_END";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Markers,
    LastValidLine,
    WholeText,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Markers => "markers",
            Strategy::LastValidLine => "last_valid_line",
            Strategy::WholeText => "whole_text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub strategy: Strategy,
    pub value: Value,
}

type Attempt = fn(&str) -> Option<Value>;

const STRATEGIES: &[(Strategy, Attempt)] = &[
    (Strategy::Markers, between_markers),
    (Strategy::LastValidLine, last_valid_line),
    (Strategy::WholeText, whole_text),
];

/// Returns the first result any strategy recovers, or `None` when the text
/// holds no parseable object.
pub fn extract(text: &str) -> Option<Extracted> {
    STRATEGIES.iter().find_map(|(strategy, attempt)| {
        attempt(text).map(|value| Extracted {
            strategy: *strategy,
            value,
        })
    })
}

fn parse_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

fn between_markers(text: &str) -> Option<Value> {
    let start = text.find(RESULT_START_MARKER)? + RESULT_START_MARKER.len();
    let end = text[start..].find(RESULT_END_MARKER)?;
    parse_object(text[start..start + end].trim())
}

fn last_valid_line(text: &str) -> Option<Value> {
    text.lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{') && line.ends_with('}'))
        .find_map(parse_object)
}

fn whole_text(text: &str) -> Option<Value> {
    parse_object(text.trim())
}

/// `Some(false)` when the result says the worker failed; token validation
/// reports through `valid` instead of `success`.
pub fn reported_success(result: &Value) -> Option<bool> {
    result
        .get("success")
        .or_else(|| result.get("valid"))
        .and_then(Value::as_bool)
}

pub fn error_message(result: &Value) -> Option<String> {
    match result.get("error").or_else(|| result.get("message"))? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Null => None,
        other @ (Value::Object(_) | Value::Array(_)) => Some(other.to_string()),
        _ => None,
    }
}

/// The created object's identifier, wherever the worker put it.
pub fn created_id(result: &Value) -> Option<String> {
    let candidates = [
        result.get("id"),
        result.get("creation_id"),
        result.get("media_id"),
        result.get("response").and_then(|r| r.get("id")),
    ];
    candidates.into_iter().flatten().find_map(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn markers_win_over_surrounding_noise() {
        let text = "starting\n[DEBUG] {\"noise\":1}\nJSON_RESPONSE_START\n{\"success\":true,\"id\":\"42\"}\nJSON_RESPONSE_END\ntrailing {\"success\":false}\n";
        let extracted = extract(text).expect("markers should extract");
        assert_eq!(extracted.strategy, Strategy::Markers);
        assert_eq!(extracted.value, json!({"success": true, "id": "42"}));
    }

    #[test]
    fn markers_accept_pretty_printed_blocks() {
        let text = "log\nJSON_RESPONSE_START\n{\n  \"success\": true,\n  \"id\": \"7\"\n}\nJSON_RESPONSE_END";
        let extracted = extract(text).unwrap();
        assert_eq!(extracted.strategy, Strategy::Markers);
        assert_eq!(extracted.value["id"], "7");
    }

    #[test]
    fn broken_marker_block_falls_back_to_last_line() {
        let text = "JSON_RESPONSE_START\nnot json\nJSON_RESPONSE_END\n{\"success\":true}";
        let extracted = extract(text).unwrap();
        assert_eq!(extracted.strategy, Strategy::LastValidLine);
        assert_eq!(extracted.value, json!({"success": true}));
    }

    #[test]
    fn end_marker_before_start_is_ignored() {
        let text = "JSON_RESPONSE_END\nJSON_RESPONSE_START\n{\"a\":1}";
        // No end marker after the start: the marker strategy declines and
        // the last line carries the result.
        let extracted = extract(text).unwrap();
        assert_eq!(extracted.strategy, Strategy::LastValidLine);
        assert_eq!(extracted.value, json!({"a": 1}));
    }

    #[test]
    fn last_valid_line_skips_trailing_log_lines() {
        let text = "[DEBUG] token set\n[DEBUG] creating container\n{\"success\":false,\"error\":\"x\"}\n[DEBUG] done\n";
        let extracted = extract(text).unwrap();
        assert_eq!(extracted.strategy, Strategy::LastValidLine);
        assert_eq!(extracted.value, json!({"success": false, "error": "x"}));
    }

    #[test]
    fn last_valid_line_prefers_the_latest_object() {
        let text = "{\"success\":true,\"creation_id\":\"1\"}\n{\"success\":true,\"response\":{\"id\":\"2\"}}";
        let extracted = extract(text).unwrap();
        assert_eq!(created_id(&extracted.value).as_deref(), Some("2"));
    }

    #[test]
    fn malformed_brace_lines_are_skipped() {
        let text = "{\"success\":true}\n{broken}\n";
        let extracted = extract(text).unwrap();
        assert_eq!(extracted.value, json!({"success": true}));
    }

    #[test]
    fn whole_text_handles_multiline_object_without_markers() {
        let text = "\n{\n  \"valid\": true,\n  \"message\": \"ok\"\n}\n";
        let extracted = extract(text).unwrap();
        assert_eq!(extracted.strategy, Strategy::WholeText);
        assert_eq!(reported_success(&extracted.value), Some(true));
    }

    #[test]
    fn unparseable_output_yields_no_result() {
        assert!(extract("").is_none());
        assert!(extract("Traceback (most recent call last):\n  boom\n").is_none());
        assert!(extract("[1, 2, 3]").is_none());
    }

    #[test]
    fn empty_object_is_a_result_not_an_absence() {
        let extracted = extract("{}").unwrap();
        assert_eq!(extracted.value, json!({}));
    }

    #[test]
    fn extraction_is_repeatable() {
        let text = "noise\n{\"success\":true,\"id\":\"9\"}\nmore noise";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn created_id_checks_known_fields_in_order() {
        assert_eq!(created_id(&json!({"id": "a"})).as_deref(), Some("a"));
        assert_eq!(
            created_id(&json!({"creation_id": 17896})).as_deref(),
            Some("17896")
        );
        assert_eq!(
            created_id(&json!({"response": {"id": "r"}})).as_deref(),
            Some("r")
        );
        assert!(created_id(&json!({"success": true})).is_none());
    }

    #[test]
    fn error_message_reads_error_then_message() {
        assert_eq!(
            error_message(&json!({"error": "bad token"})).as_deref(),
            Some("bad token")
        );
        assert_eq!(
            error_message(&json!({"message": "expired"})).as_deref(),
            Some("expired")
        );
        assert_eq!(
            error_message(&json!({"error": {"code": 190}})).as_deref(),
            Some("{\"code\":190}")
        );
        assert!(error_message(&json!({"success": true})).is_none());
    }
}
