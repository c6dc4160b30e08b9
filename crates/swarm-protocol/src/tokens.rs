//! Protocol tokens the engine matches on.
//!
//! These are the literal status values and identity conventions emitted by
//! the executor. They are injectable so the engine stays agnostic of the
//! protocol revision producing the events.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolTokens {
    /// Reserved agent id of the orchestrator.
    pub orchestrator_agent_id: String,
    /// Role value identifying the orchestrator.
    pub orchestrator_role: String,
    /// Orchestrator status marking a re-planning boundary.
    pub plan_ready_status: String,
    /// Agent status carrying a human-facing message.
    pub message_status: String,
    /// Synthetic tool used to emit messages; hidden from the timeline.
    pub message_tool: String,
    /// Finish status marking a failed run (case-insensitive).
    pub failure_status: String,
    /// Tool result status marking an errored invocation.
    pub error_status: String,
}

impl Default for ProtocolTokens {
    fn default() -> Self {
        Self {
            orchestrator_agent_id: "agent-0".to_owned(),
            orchestrator_role: "orchestrator".to_owned(),
            plan_ready_status: "plan_ready".to_owned(),
            message_status: "message".to_owned(),
            message_tool: "message".to_owned(),
            failure_status: "failed".to_owned(),
            error_status: "error".to_owned(),
        }
    }
}

impl ProtocolTokens {
    pub fn is_orchestrator(&self, agent_id: Option<&str>, role: Option<&str>) -> bool {
        agent_id == Some(self.orchestrator_agent_id.as_str())
            || role == Some(self.orchestrator_role.as_str())
    }

    pub fn is_failure(&self, status: Option<&str>) -> bool {
        status.is_some_and(|s| s.trim().eq_ignore_ascii_case(&self.failure_status))
    }

    pub fn is_error(&self, status: Option<&str>) -> bool {
        status == Some(self.error_status.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestrator_matches_by_id_or_role() {
        let tokens = ProtocolTokens::default();
        assert!(tokens.is_orchestrator(Some("agent-0"), None));
        assert!(tokens.is_orchestrator(Some("planner"), Some("orchestrator")));
        assert!(!tokens.is_orchestrator(Some("agent-1"), Some("researcher")));
        assert!(!tokens.is_orchestrator(None, None));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let tokens: ProtocolTokens =
            serde_json::from_str(r#"{"plan_ready_status":"replanned"}"#).unwrap();
        assert_eq!(tokens.plan_ready_status, "replanned");
        assert_eq!(tokens.orchestrator_agent_id, "agent-0");
    }

    #[test]
    fn failure_status_is_case_insensitive() {
        let tokens = ProtocolTokens::default();
        assert!(tokens.is_failure(Some("FAILED")));
        assert!(!tokens.is_failure(Some("completed")));
        assert!(!tokens.is_failure(None));
    }
}
