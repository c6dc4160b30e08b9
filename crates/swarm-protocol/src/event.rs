//! Canonical event shape for swarm runs.
//!
//! A [`SwarmEvent`] is the normalized form of one message emitted by the
//! remote executor. Raw payloads arrive with either snake_case or PascalCase
//! field names; the normalizer in `swarm-events` folds both into this shape.
//!
//! Forward-compatible: unknown `"type"` tokens are kept as
//! [`EventType::Other`] instead of failing.

use crate::ids::{AgentId, RunId};
use crate::tokens::ProtocolTokens;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Canonical meta key carrying the per-agent tool call ordinal.
pub const TOOL_INDEX_KEY: &str = "tool_index";
/// Canonical meta key carrying a truncated tool output.
pub const OUTPUT_PREVIEW_KEY: &str = "output_preview";

/// Epoch values below this magnitude are seconds, otherwise milliseconds.
const EPOCH_SECONDS_CEILING: f64 = 1e11;

/// Event kind token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    /// `swarm_started`: opens a run and carries its task text.
    SwarmStarted,
    /// `swarm_finished`: closes a run; status `failed` marks failure.
    SwarmFinished,
    ToolCall,
    ToolResult,
    AgentStatus,
    AgentStarted,
    AgentFinished,
    /// Any token this engine does not consume.
    Other(String),
}

impl EventType {
    pub fn from_token(token: &str) -> Self {
        match token {
            "swarm_started" => Self::SwarmStarted,
            "swarm_finished" => Self::SwarmFinished,
            "tool_call" => Self::ToolCall,
            "tool_result" => Self::ToolResult,
            "agent_status" => Self::AgentStatus,
            "agent_started" => Self::AgentStarted,
            "agent_finished" => Self::AgentFinished,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SwarmStarted => "swarm_started",
            Self::SwarmFinished => "swarm_finished",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::AgentStatus => "agent_status",
            Self::AgentStarted => "agent_started",
            Self::AgentFinished => "agent_finished",
            Self::Other(token) => token,
        }
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Self::from_token(&token))
    }
}

/// Wall-clock instant as emitted: RFC 3339 text or an epoch number.
///
/// Kept raw so that an event with an unreadable timestamp is still part of
/// the run history; resolution happens on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTimestamp {
    Text(String),
    Epoch(f64),
}

impl EventTimestamp {
    /// Resolve to UTC. `None` when the value cannot be interpreted.
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(value) => epoch_to_utc(*value),
            Self::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                    return Some(parsed.with_timezone(&Utc));
                }
                if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
                    return Some(naive.and_utc());
                }
                text.parse::<f64>().ok().and_then(epoch_to_utc)
            }
        }
    }
}

fn epoch_to_utc(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() < EPOCH_SECONDS_CEILING {
        value * 1000.0
    } else {
        value
    };
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis.round() as i64)
}

/// Parse a tool index out of a meta value: integer, integral float, or
/// numeric string.
pub fn parse_tool_index(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Normalized execution event. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<EventTimestamp>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl SwarmEvent {
    /// Minimal event of the given kind; remaining fields empty.
    pub fn new(event_type: EventType, run_id: impl Into<RunId>) -> Self {
        Self {
            event_type,
            run_id: run_id.into(),
            agent_id: None,
            role: None,
            status: None,
            message: Value::Null,
            tool_name: None,
            timestamp: None,
            meta: Map::new(),
        }
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn agent(&self) -> Option<&str> {
        self.agent_id
            .as_ref()
            .map(AgentId::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn tool_index(&self) -> Option<u64> {
        self.meta.get(TOOL_INDEX_KEY).and_then(parse_tool_index)
    }

    pub fn output_preview(&self) -> Option<&str> {
        self.meta.get(OUTPUT_PREVIEW_KEY).and_then(Value::as_str)
    }

    /// Message as plain text: strings verbatim, structured payloads as JSON.
    pub fn message_text(&self) -> String {
        match &self.message {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }

    pub fn resolved_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_ref().and_then(EventTimestamp::resolve)
    }

    pub fn is_orchestrator(&self, tokens: &ProtocolTokens) -> bool {
        tokens.is_orchestrator(self.agent(), self.role.as_deref())
    }
}
