//! Raw payload → [`SwarmEvent`] canonicalization.
//!
//! Executors emit either snake_case (`run_id`) or PascalCase (`RunID`) field
//! names. The snake_case name is primary and wins when both carry a value.

use serde_json::{Map, Value};
use swarm_protocol::{
    AgentId, EventTimestamp, EventType, NormalizeError, RunId, SwarmEvent, TOOL_INDEX_KEY,
};

const ALT_TOOL_INDEX_KEY: &str = "toolIndex";

/// Parse and canonicalize one raw message.
pub fn normalize(raw: &str) -> Result<SwarmEvent, NormalizeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| NormalizeError::InvalidJson(err.to_string()))?;
    normalize_value(value)
}

/// Canonicalize an already-decoded payload.
pub fn normalize_value(value: Value) -> Result<SwarmEvent, NormalizeError> {
    let Value::Object(mut object) = value else {
        return Err(NormalizeError::NotAnObject);
    };

    let event_type = required_string(&object, "type", "Type")?;
    let run_id = required_string(&object, "run_id", "RunID")?;

    let agent_id = optional_string(&object, "agent_id", "AgentID")?;
    let role = optional_string(&object, "role", "Role")?;
    let status = optional_string(&object, "status", "Status")?;
    let tool_name = optional_string(&object, "tool_name", "ToolName")?;
    let timestamp = timestamp_field(&object)?;
    let meta = meta_field(&mut object)?;
    let message = take_field(&mut object, "message", "Message").unwrap_or(Value::Null);

    Ok(SwarmEvent {
        event_type: EventType::from_token(&event_type),
        run_id: RunId::from_string(run_id),
        agent_id: agent_id.map(AgentId::from_string),
        role,
        status,
        message,
        tool_name,
        timestamp,
        meta,
    })
}

fn pick<'a>(object: &'a Map<String, Value>, primary: &str, alternate: &str) -> Option<&'a Value> {
    object
        .get(primary)
        .filter(|value| !value.is_null())
        .or_else(|| object.get(alternate).filter(|value| !value.is_null()))
}

fn take_field(object: &mut Map<String, Value>, primary: &str, alternate: &str) -> Option<Value> {
    let primary_value = object.remove(primary).filter(|value| !value.is_null());
    let alternate_value = object.remove(alternate).filter(|value| !value.is_null());
    primary_value.or(alternate_value)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Errors name the field by its `primary` key.
fn optional_string(
    object: &Map<String, Value>,
    primary: &'static str,
    alternate: &str,
) -> Result<Option<String>, NormalizeError> {
    match pick(object, primary, alternate) {
        None => Ok(None),
        Some(value) => scalar_text(value)
            .map(Some)
            .ok_or_else(|| NormalizeError::InvalidField {
                field: primary,
                reason: "expected a string".to_owned(),
            }),
    }
}

fn required_string(
    object: &Map<String, Value>,
    primary: &'static str,
    alternate: &str,
) -> Result<String, NormalizeError> {
    let text = optional_string(object, primary, alternate)?
        .map(|text| text.trim().to_owned())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(NormalizeError::MissingField(primary));
    }
    Ok(text)
}

fn timestamp_field(object: &Map<String, Value>) -> Result<Option<EventTimestamp>, NormalizeError> {
    match pick(object, "timestamp", "Timestamp") {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(EventTimestamp::Text(text.clone()))),
        Some(Value::Number(number)) => Ok(number.as_f64().map(EventTimestamp::Epoch)),
        Some(_) => Err(NormalizeError::InvalidField {
            field: "timestamp",
            reason: "expected a string or number".to_owned(),
        }),
    }
}

fn meta_field(object: &mut Map<String, Value>) -> Result<Map<String, Value>, NormalizeError> {
    let Some(value) = take_field(object, "meta", "Meta") else {
        return Ok(Map::new());
    };
    let Value::Object(mut meta) = value else {
        return Err(NormalizeError::InvalidField {
            field: "meta",
            reason: "expected an object".to_owned(),
        });
    };
    if let Some(tool_index) = take_field(&mut meta, TOOL_INDEX_KEY, ALT_TOOL_INDEX_KEY) {
        meta.insert(TOOL_INDEX_KEY.to_owned(), tool_index);
    }
    Ok(meta)
}
