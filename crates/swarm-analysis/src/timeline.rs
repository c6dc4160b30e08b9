//! Display timeline and tool call/result pairing.
//!
//! Pure derivations over a run's arrival-ordered event list. The run itself
//! is never modified; every call recomputes from the events it is given.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use swarm_protocol::{EventType, ProtocolTokens, SwarmEvent};

/// Completion state of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolState {
    Pending,
    Finished { errored: bool, output: String },
}

impl ToolState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Self::Finished { errored: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEntry {
    /// Agent status carrying a human-facing message.
    Message { event: SwarmEvent },
    /// Tool invocation with its paired outcome, if any.
    Tool {
        call: SwarmEvent,
        tool_index: Option<u64>,
        state: ToolState,
    },
}

impl TimelineEntry {
    pub fn event(&self) -> &SwarmEvent {
        match self {
            Self::Message { event } => event,
            Self::Tool { call, .. } => call,
        }
    }
}

/// `tool_index` → tool result lookup for one run.
///
/// Keyed on the index alone, independent of the emitting agent. When several
/// results share an index the latest by arrival wins.
#[derive(Debug, Clone, Default)]
pub struct ToolOutcomeIndex<'a> {
    by_index: HashMap<u64, &'a SwarmEvent>,
}

impl<'a> ToolOutcomeIndex<'a> {
    pub fn build(events: &'a [SwarmEvent]) -> Self {
        let mut by_index = HashMap::new();
        for event in events {
            if event.event_type != EventType::ToolResult {
                continue;
            }
            if let Some(index) = event.tool_index() {
                by_index.insert(index, event);
            }
        }
        Self { by_index }
    }

    pub fn get(&self, tool_index: u64) -> Option<&'a SwarmEvent> {
        self.by_index.get(&tool_index).copied()
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// State of the invocation `call`; calls without an index stay pending.
    pub fn state_for(&self, call: &SwarmEvent, tokens: &ProtocolTokens) -> ToolState {
        let Some(result) = call.tool_index().and_then(|index| self.get(index)) else {
            return ToolState::Pending;
        };
        let output = result
            .output_preview()
            .map(str::to_owned)
            .unwrap_or_else(|| result.message_text());
        ToolState::Finished {
            errored: tokens.is_error(result.status()),
            output,
        }
    }
}

fn is_display_message(event: &SwarmEvent, tokens: &ProtocolTokens) -> bool {
    event.event_type == EventType::AgentStatus
        && event.status() == Some(tokens.message_status.as_str())
}

fn is_display_tool_call(event: &SwarmEvent, tokens: &ProtocolTokens) -> bool {
    event.event_type == EventType::ToolCall
        && event.tool_name.as_deref() != Some(tokens.message_tool.as_str())
}

/// Message statuses and non-message tool calls, in arrival order.
pub fn compose_timeline(events: &[SwarmEvent], tokens: &ProtocolTokens) -> Vec<TimelineEntry> {
    let outcomes = ToolOutcomeIndex::build(events);
    events
        .iter()
        .filter_map(|event| {
            if is_display_message(event, tokens) {
                Some(TimelineEntry::Message {
                    event: event.clone(),
                })
            } else if is_display_tool_call(event, tokens) {
                Some(TimelineEntry::Tool {
                    call: event.clone(),
                    tool_index: event.tool_index(),
                    state: outcomes.state_for(event, tokens),
                })
            } else {
                None
            }
        })
        .collect()
}

/// Stable 1-based agent ordinals by first appearance.
///
/// Only agent-scoped events are numbered; run lifecycle events carry no agent.
#[derive(Debug, Clone, Default)]
pub struct AgentRoster {
    ordinals: IndexMap<String, usize>,
}

impl AgentRoster {
    const UNKNOWN_AGENT: &'static str = "unknown";
    const DEFAULT_ROLE: &'static str = "system";

    pub fn from_events(events: &[SwarmEvent]) -> Self {
        let mut roster = Self::default();
        for event in events {
            roster.observe(event);
        }
        roster
    }

    pub fn observe(&mut self, event: &SwarmEvent) -> Option<usize> {
        if !Self::is_agent_scoped(&event.event_type) {
            return None;
        }
        let key = event.agent().unwrap_or(Self::UNKNOWN_AGENT);
        let next = self.ordinals.len() + 1;
        Some(*self.ordinals.entry(key.to_owned()).or_insert(next))
    }

    fn is_agent_scoped(event_type: &EventType) -> bool {
        matches!(
            event_type,
            EventType::AgentStarted
                | EventType::AgentStatus
                | EventType::ToolCall
                | EventType::ToolResult
                | EventType::AgentFinished
        )
    }

    pub fn ordinal(&self, agent_id: &str) -> Option<usize> {
        self.ordinals.get(agent_id).copied()
    }

    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }

    /// `[role] agent N` for an event already observed by the roster.
    pub fn label(&self, event: &SwarmEvent) -> String {
        let role = event
            .role
            .as_deref()
            .filter(|role| !role.is_empty())
            .unwrap_or(Self::DEFAULT_ROLE);
        let key = event.agent().unwrap_or(Self::UNKNOWN_AGENT);
        match self.ordinal(key) {
            Some(ordinal) => format!("[{role}] agent {ordinal}"),
            None => format!("[{role}] {key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use swarm_protocol::{AgentId, TOOL_INDEX_KEY};

    use super::*;

    fn status(agent: &str, status: &str, message: &str) -> SwarmEvent {
        let mut event = SwarmEvent::new(EventType::AgentStatus, "run");
        event.agent_id = Some(AgentId::from(agent));
        event.status = Some(status.to_owned());
        event.message = json!(message);
        event
    }

    fn tool_call(tool: &str, index: Option<u64>) -> SwarmEvent {
        let mut event = SwarmEvent::new(EventType::ToolCall, "run");
        event.agent_id = Some(AgentId::from("agent-1"));
        event.tool_name = Some(tool.to_owned());
        if let Some(index) = index {
            event.meta.insert(TOOL_INDEX_KEY.to_owned(), json!(index));
        }
        event
    }

    fn tool_result(index: u64, status: &str, message: &str) -> SwarmEvent {
        let mut event = SwarmEvent::new(EventType::ToolResult, "run");
        event.status = Some(status.to_owned());
        event.message = json!(message);
        event.meta.insert(TOOL_INDEX_KEY.to_owned(), json!(index));
        event
    }

    #[test]
    fn errored_result_finishes_call_and_unmatched_call_stays_pending() {
        let tokens = ProtocolTokens::default();
        let events = vec![
            tool_call("web_search", Some(3)),
            tool_result(3, "error", "tool failed: timeout"),
            tool_call("read_file", Some(4)),
        ];
        let timeline = compose_timeline(&events, &tokens);
        assert_eq!(timeline.len(), 2);

        let TimelineEntry::Tool { state, tool_index, .. } = &timeline[0] else {
            panic!("expected tool entry");
        };
        assert_eq!(*tool_index, Some(3));
        assert_eq!(
            *state,
            ToolState::Finished {
                errored: true,
                output: "tool failed: timeout".to_owned()
            }
        );

        let TimelineEntry::Tool { state, .. } = &timeline[1] else {
            panic!("expected tool entry");
        };
        assert!(state.is_pending());
    }

    #[test]
    fn timeline_keeps_messages_and_real_tools_only() {
        let tokens = ProtocolTokens::default();
        let events = vec![
            SwarmEvent::new(EventType::SwarmStarted, "run"),
            status("agent-1", "message", "looking into it"),
            status("agent-1", "requires_action", "calling tools"),
            tool_call("message", Some(1)),
            tool_call("web_search", Some(2)),
            tool_result(2, "ok", "tool executed"),
            SwarmEvent::new(EventType::SwarmFinished, "run"),
        ];
        let timeline = compose_timeline(&events, &tokens);
        let kinds: Vec<_> = timeline
            .iter()
            .map(|entry| match entry {
                TimelineEntry::Message { event } => event.message_text(),
                TimelineEntry::Tool { call, .. } => call.tool_name.clone().unwrap_or_default(),
            })
            .collect();
        assert_eq!(kinds, vec!["looking into it", "web_search"]);
    }

    #[test]
    fn latest_result_wins_for_shared_index() {
        let tokens = ProtocolTokens::default();
        let events = vec![
            tool_call("web_search", Some(1)),
            tool_result(1, "error", "first"),
            tool_result(1, "ok", "second"),
        ];
        let index = ToolOutcomeIndex::build(&events);
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.state_for(&events[0], &tokens),
            ToolState::Finished {
                errored: false,
                output: "second".to_owned()
            }
        );
    }

    #[test]
    fn output_preview_is_preferred_over_message() {
        let tokens = ProtocolTokens::default();
        let mut result = tool_result(5, "ok", "tool executed, output=...");
        result
            .meta
            .insert("output_preview".to_owned(), json!("{\"rows\":3}"));
        let events = vec![tool_call("sql", Some(5)), result];
        let timeline = compose_timeline(&events, &tokens);
        let TimelineEntry::Tool { state, .. } = &timeline[0] else {
            panic!("expected tool entry");
        };
        assert_eq!(
            *state,
            ToolState::Finished {
                errored: false,
                output: "{\"rows\":3}".to_owned()
            }
        );
    }

    #[test]
    fn call_without_index_is_pending_and_missing_tool_name_is_shown() {
        let tokens = ProtocolTokens::default();
        let mut nameless = SwarmEvent::new(EventType::ToolCall, "run");
        nameless.meta.insert(TOOL_INDEX_KEY.to_owned(), json!(9));
        let events = vec![tool_call("web_search", None), tool_result(1, "ok", "x"), nameless];
        let timeline = compose_timeline(&events, &tokens);
        assert_eq!(timeline.len(), 2);
        assert!(timeline.iter().all(|entry| matches!(
            entry,
            TimelineEntry::Tool { state: ToolState::Pending, .. }
        )));
    }

    #[test]
    fn roster_assigns_ordinals_by_first_appearance() {
        let mut orchestrator = status("agent-0", "plan_ready", "plan");
        orchestrator.role = Some("orchestrator".to_owned());
        let mut worker = status("agent-2", "message", "hi");
        worker.role = Some("researcher".to_owned());
        let anonymous = SwarmEvent::new(EventType::AgentStatus, "run");

        let events = vec![worker.clone(), orchestrator.clone(), anonymous.clone(), worker.clone()];
        let roster = AgentRoster::from_events(&events);
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.label(&worker), "[researcher] agent 1");
        assert_eq!(roster.label(&orchestrator), "[orchestrator] agent 2");
        assert_eq!(roster.label(&anonymous), "[system] agent 3");
    }

    #[test]
    fn roster_skips_run_lifecycle_events() {
        let mut orchestrator = status("agent-0", "plan_ready", "plan");
        orchestrator.role = Some("orchestrator".to_owned());
        let events = vec![
            SwarmEvent::new(EventType::SwarmStarted, "run"),
            orchestrator.clone(),
            tool_call("web_search", Some(1)),
            SwarmEvent::new(EventType::SwarmFinished, "run"),
        ];
        let mut roster = AgentRoster::from_events(&events);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.ordinal("unknown"), None);
        assert_eq!(roster.label(&orchestrator), "[orchestrator] agent 1");
        assert_eq!(roster.label(&events[2]), "[system] agent 2");
        assert_eq!(roster.observe(&events[3]), None);
    }
}
