//! Final summary extraction from a `swarm_finished` message.
//!
//! The finish message may be plain text, JSON encoded as text, or a nested
//! object. Resolution order for objects:
//! 1. `summary` as a string
//! 2. `summary.markdown` / `summary.message` / `summary.text`
//! 3. top-level `message` or `text` (resolved recursively)
//! 4. `label: value` lines over the object's own fields

use serde_json::{Map, Value};
use swarm_protocol::{EventType, SwarmEvent};

const MAX_DEPTH: usize = 8;
const SUMMARY_TEXT_KEYS: [&str; 3] = ["markdown", "message", "text"];
const MESSAGE_KEYS: [&str; 2] = ["message", "text"];

/// Human-readable text for any finish message shape. Never fails.
pub fn extract_final_summary(message: &Value) -> String {
    resolve(message, 0)
}

/// Summary of the last `swarm_finished` event by arrival, if the run finished.
pub fn final_summary(events: &[SwarmEvent]) -> Option<String> {
    events
        .iter()
        .rev()
        .find(|event| event.event_type == EventType::SwarmFinished)
        .map(|event| extract_final_summary(&event.message))
}

fn resolve(value: &Value, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return raw(value);
    }
    match value {
        Value::Null => String::new(),
        Value::String(text) => match decode_embedded(text) {
            Some(decoded) => resolve(&decoded, depth + 1),
            None => text.clone(),
        },
        Value::Object(object) => resolve_object(object, depth),
        other => raw(other),
    }
}

/// JSON objects or strings encoded inside a string.
fn decode_embedded(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('"')) {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ (Value::Object(_) | Value::String(_))) => Some(value),
        _ => None,
    }
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

fn resolve_object(object: &Map<String, Value>, depth: usize) -> String {
    match object.get("summary") {
        Some(Value::String(text)) if !text.trim().is_empty() => {
            return resolve(&Value::String(text.clone()), depth + 1);
        }
        Some(Value::Object(summary)) => {
            if let Some(text) = SUMMARY_TEXT_KEYS
                .iter()
                .find_map(|key| non_blank_str(summary.get(*key)))
            {
                return text.to_owned();
            }
        }
        _ => {}
    }

    for key in MESSAGE_KEYS {
        let Some(value) = object.get(key) else {
            continue;
        };
        let text = resolve(value, depth + 1);
        if !text.trim().is_empty() {
            return text;
        }
    }

    render_fields(object)
}

fn render_fields(object: &Map<String, Value>) -> String {
    if object.is_empty() {
        return raw(&Value::Object(object.clone()));
    }
    object
        .iter()
        .map(|(label, value)| format!("{label}: {}", raw(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn raw(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_string_is_returned_verbatim() {
        assert_eq!(
            extract_final_summary(&json!("All three sources agree.")),
            "All three sources agree."
        );
    }

    #[test]
    fn summary_string_field_wins() {
        let message = json!({"summary": "short answer", "message": "ignored"});
        assert_eq!(extract_final_summary(&message), "short answer");
    }

    #[test]
    fn summary_object_sub_fields_are_checked_in_order() {
        let markdown = json!({"summary": {"markdown": "# Title", "text": "plain"}});
        assert_eq!(extract_final_summary(&markdown), "# Title");

        let text_only = json!({"summary": {"markdown": "  ", "text": "plain"}});
        assert_eq!(extract_final_summary(&text_only), "plain");
    }

    #[test]
    fn json_encoded_string_is_decoded() {
        let encoded = json!(r#"{"summary":{"message":"decoded"}}"#);
        assert_eq!(extract_final_summary(&encoded), "decoded");

        let nested = json!({"message": r#"{"text":"deep"}"#});
        assert_eq!(extract_final_summary(&nested), "deep");
    }

    #[test]
    fn top_level_message_then_text() {
        assert_eq!(extract_final_summary(&json!({"message": "m"})), "m");
        assert_eq!(
            extract_final_summary(&json!({"message": "", "text": "t"})),
            "t"
        );
    }

    #[test]
    fn falls_back_to_label_value_rendering() {
        let message = json!({"findings": 3, "status": "partial", "sources": ["a", "b"]});
        assert_eq!(
            extract_final_summary(&message),
            "findings: 3\nsources: [\"a\",\"b\"]\nstatus: partial"
        );
    }

    #[test]
    fn odd_shapes_never_panic() {
        assert_eq!(extract_final_summary(&json!(null)), "");
        assert_eq!(extract_final_summary(&json!(42)), "42");
        assert_eq!(extract_final_summary(&json!([1, 2])), "[1,2]");
        assert_eq!(extract_final_summary(&json!({})), "{}");
        assert_eq!(extract_final_summary(&json!("{not json")), "{not json");
        assert_eq!(
            extract_final_summary(&json!({"summary": 7})),
            "summary: 7"
        );
    }

    #[test]
    fn deeply_encoded_strings_stop_at_depth_limit() {
        let mut value = json!("bottom");
        for _ in 0..20 {
            value = Value::String(value.to_string());
        }
        let text = extract_final_summary(&value);
        assert!(text.contains("bottom"));
    }

    #[test]
    fn final_summary_uses_last_finish_event() {
        let mut first = SwarmEvent::new(EventType::SwarmFinished, "r");
        first.message = json!("first");
        let mut last = SwarmEvent::new(EventType::SwarmFinished, "r");
        last.message = json!({"summary": "last"});
        let events = vec![SwarmEvent::new(EventType::SwarmStarted, "r"), first, last];
        assert_eq!(final_summary(&events).as_deref(), Some("last"));
        assert_eq!(final_summary(&events[..1]), None);
    }
}
