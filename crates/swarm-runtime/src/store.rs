//! In-memory run store built by folding normalized events.
//!
//! Policy:
//! - a run exists only once its `swarm_started` event has been folded;
//! - events for unknown runs are reported as [`ApplyOutcome::IgnoredUnknownRun`]
//!   and leave the store untouched;
//! - status is monotonic: the first `swarm_finished` decides it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use swarm_protocol::{EventType, ProtocolTokens, RunId, SwarmEvent};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub id: RunId,
    pub task: String,
    pub status: RunStatus,
    /// Arrival order, not timestamp order.
    pub events: Vec<SwarmEvent>,
}

impl Run {
    fn started(event: SwarmEvent) -> Self {
        Self {
            id: event.run_id.clone(),
            task: event.message_text(),
            status: RunStatus::Running,
            events: vec![event],
        }
    }

    /// Last `swarm_finished` event by arrival.
    pub fn finish_event(&self) -> Option<&SwarmEvent> {
        self.events
            .iter()
            .rev()
            .find(|event| event.event_type == EventType::SwarmFinished)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunChange {
    Created,
    Appended,
    Finished(RunStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { run_id: RunId, change: RunChange },
    IgnoredUnknownRun { run_id: RunId },
}

/// Point-in-time copy of the store, runs in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStoreSnapshot {
    pub runs: Vec<Run>,
}

impl RunStoreSnapshot {
    pub fn get(&self, run_id: &str) -> Option<&Run> {
        self.runs.iter().find(|run| run.id.as_str() == run_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunStore {
    runs: IndexMap<RunId, Run>,
    tokens: ProtocolTokens,
}

impl RunStore {
    pub fn new(tokens: ProtocolTokens) -> Self {
        Self {
            runs: IndexMap::new(),
            tokens,
        }
    }

    pub fn apply(&mut self, event: SwarmEvent) -> ApplyOutcome {
        let run_id = event.run_id.clone();

        if event.event_type == EventType::SwarmStarted && !self.runs.contains_key(&run_id) {
            let run = Run::started(event);
            info!(run_id = %run_id, task = %run.task, "run started");
            self.runs.insert(run_id.clone(), run);
            return ApplyOutcome::Applied {
                run_id,
                change: RunChange::Created,
            };
        }

        let Some(run) = self.runs.get_mut(&run_id) else {
            debug!(
                run_id = %run_id,
                event_type = event.event_type.as_str(),
                "event for unknown run ignored"
            );
            return ApplyOutcome::IgnoredUnknownRun { run_id };
        };

        let change = if event.event_type == EventType::SwarmFinished && !run.status.is_terminal() {
            run.status = if self.tokens.is_failure(event.status()) {
                RunStatus::Failed
            } else {
                RunStatus::Completed
            };
            info!(run_id = %run_id, status = run.status.as_str(), "run finished");
            RunChange::Finished(run.status)
        } else {
            RunChange::Appended
        };
        run.events.push(event);

        ApplyOutcome::Applied { run_id, change }
    }

    pub fn get(&self, run_id: &str) -> Option<&Run> {
        self.runs.get(run_id)
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.runs.values()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn snapshot(&self) -> RunStoreSnapshot {
        RunStoreSnapshot {
            runs: self.runs.values().cloned().collect(),
        }
    }
}
