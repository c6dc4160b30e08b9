//! Serialized ingestion of raw swarm events into a [`RunStore`].
//!
//! [`SwarmEngine`] owns the dedup window and the run store behind a single
//! lock: a payload admitted by dedup is always folded into the same store
//! generation that admitted it.

pub mod store;

pub use store::{ApplyOutcome, Run, RunChange, RunStatus, RunStore, RunStoreSnapshot};

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{Stream, StreamExt, pin_mut};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use swarm_events::{Admission, DEFAULT_DEDUP_CAPACITY, EventNormalizer, EventStreamHub};
use swarm_protocol::{
    NormalizeError, ProtocolTokens, RunId, SwarmError, SwarmEvent, SwarmResult,
};
use tracing::{Span, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub dedup_capacity: usize,
    pub stream_buffer: usize,
    pub tokens: ProtocolTokens,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            stream_buffer: 1024,
            tokens: ProtocolTokens::default(),
        }
    }

    /// Parse a (possibly partial) JSON config; missing keys keep defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("failed parsing engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_dedup_capacity(mut self, dedup_capacity: usize) -> Self {
        self.dedup_capacity = dedup_capacity;
        self
    }

    pub fn with_tokens(mut self, tokens: ProtocolTokens) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn validate(&self) -> SwarmResult<()> {
        if self.dedup_capacity == 0 {
            return Err(SwarmError::InvalidConfig(
                "dedup_capacity must be at least 1".to_owned(),
            ));
        }
        if self.tokens.orchestrator_agent_id.trim().is_empty() {
            return Err(SwarmError::InvalidConfig(
                "tokens.orchestrator_agent_id must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Outcome of ingesting one raw payload.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Applied { run_id: RunId, change: RunChange },
    IgnoredUnknownRun { run_id: RunId },
    Duplicate,
    Malformed(NormalizeError),
}

impl From<ApplyOutcome> for IngestOutcome {
    fn from(outcome: ApplyOutcome) -> Self {
        match outcome {
            ApplyOutcome::Applied { run_id, change } => Self::Applied { run_id, change },
            ApplyOutcome::IgnoredUnknownRun { run_id } => Self::IgnoredUnknownRun { run_id },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub received: u64,
    pub applied: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub ignored_unknown_run: u64,
}

impl IngestStats {
    pub fn record(&mut self, outcome: &IngestOutcome) {
        self.received += 1;
        match outcome {
            IngestOutcome::Applied { .. } => self.applied += 1,
            IngestOutcome::IgnoredUnknownRun { .. } => self.ignored_unknown_run += 1,
            IngestOutcome::Duplicate => self.duplicates += 1,
            IngestOutcome::Malformed(_) => self.malformed += 1,
        }
    }
}

#[derive(Debug)]
struct EngineState {
    normalizer: EventNormalizer,
    store: RunStore,
}

#[derive(Clone)]
pub struct SwarmEngine {
    config: EngineConfig,
    state: Arc<Mutex<EngineState>>,
    stream: EventStreamHub,
}

impl SwarmEngine {
    /// Fails with [`SwarmError::InvalidConfig`] when `config` does not validate.
    pub fn new(config: EngineConfig) -> SwarmResult<Self> {
        config.validate()?;
        let state = EngineState {
            normalizer: EventNormalizer::new(config.dedup_capacity),
            store: RunStore::new(config.tokens.clone()),
        };
        Ok(Self {
            stream: EventStreamHub::new(config.stream_buffer),
            state: Arc::new(Mutex::new(state)),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tokens(&self) -> &ProtocolTokens {
        &self.config.tokens
    }

    /// Dedup and fold one raw payload. Never fails; the outcome says what happened.
    #[instrument(
        skip(self, raw),
        fields(bytes = raw.len(), run_id = tracing::field::Empty, event_type = tracing::field::Empty)
    )]
    pub fn ingest(&self, raw: &str) -> IngestOutcome {
        let mut state = self.state.lock();
        let event = match state.normalizer.accept(raw) {
            Admission::Admitted(event) => event,
            Admission::Duplicate => return IngestOutcome::Duplicate,
            Admission::Malformed(error) => return IngestOutcome::Malformed(error),
        };
        let span = Span::current();
        span.record("run_id", event.run_id.as_str());
        span.record("event_type", event.event_type.as_str());

        let published = event.clone();
        let outcome = state.store.apply(event);
        if matches!(outcome, ApplyOutcome::Applied { .. }) {
            self.stream.publish(published);
        }
        outcome.into()
    }

    /// Fold every payload of `stream` in order. Stops at the first read error.
    pub async fn consume<S>(&self, stream: S) -> Result<IngestStats>
    where
        S: Stream<Item = Result<String>>,
    {
        pin_mut!(stream);
        let mut stats = IngestStats::default();
        while let Some(raw) = stream.next().await {
            let raw = raw.context("event source failed")?;
            let outcome = self.ingest(&raw);
            stats.record(&outcome);
        }
        info!(
            received = stats.received,
            applied = stats.applied,
            duplicates = stats.duplicates,
            malformed = stats.malformed,
            ignored_unknown_run = stats.ignored_unknown_run,
            "event stream drained"
        );
        Ok(stats)
    }

    pub fn snapshot(&self) -> RunStoreSnapshot {
        self.state.lock().store.snapshot()
    }

    pub fn run(&self, run_id: &str) -> Option<Run> {
        self.state.lock().store.get(run_id).cloned()
    }

    pub fn require_run(&self, run_id: &str) -> SwarmResult<Run> {
        self.run(run_id)
            .ok_or_else(|| SwarmError::RunNotFound(run_id.to_owned()))
    }

    /// Copy of a run's event history for pure derivations.
    pub fn run_events(&self, run_id: &str) -> Option<Vec<SwarmEvent>> {
        self.state
            .lock()
            .store
            .get(run_id)
            .map(|run| run.events.clone())
    }

    pub fn run_count(&self) -> usize {
        self.state.lock().store.len()
    }

    pub fn dedup_len(&self) -> usize {
        self.state.lock().normalizer.window().len()
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<SwarmEvent> {
        self.stream.subscribe()
    }
}
