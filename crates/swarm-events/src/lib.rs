//! # swarm-events: ingestion front of the run engine
//!
//! - [`normalize`]: canonicalize dual-named raw payloads into `SwarmEvent`
//! - [`dedup`]: bounded seen-set over exact payload text
//! - [`source`]: raw payload sources (JSONL capture, stdin)
//!
//! [`EventNormalizer`] combines the first two; [`EventStreamHub`] fans
//! admitted events out to live subscribers.

pub mod dedup;
pub mod normalize;
pub mod source;

pub use dedup::{DEFAULT_DEDUP_CAPACITY, DedupWindow};
pub use normalize::{normalize, normalize_value};
pub use source::{JsonlFileSource, RawEventSource, RawEventStream, StdinSource};

use swarm_protocol::{NormalizeError, SwarmEvent};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// Result of offering one raw payload to the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted(SwarmEvent),
    Duplicate,
    Malformed(NormalizeError),
}

/// Validates, canonicalizes and deduplicates raw payloads.
///
/// Owns its [`DedupWindow`]; independent instances share no state.
#[derive(Debug, Clone, Default)]
pub struct EventNormalizer {
    window: DedupWindow,
}

impl EventNormalizer {
    pub fn new(dedup_capacity: usize) -> Self {
        Self {
            window: DedupWindow::new(dedup_capacity),
        }
    }

    pub fn with_window(window: DedupWindow) -> Self {
        Self { window }
    }

    /// Malformed payloads are not recorded in the window.
    pub fn accept(&mut self, raw: &str) -> Admission {
        let event = match normalize(raw) {
            Ok(event) => event,
            Err(error) => {
                warn!(%error, "dropping malformed event payload");
                return Admission::Malformed(error);
            }
        };
        if !self.window.admit(raw) {
            return Admission::Duplicate;
        }
        Admission::Admitted(event)
    }

    pub fn window(&self) -> &DedupWindow {
        &self.window
    }
}

#[derive(Clone, Debug)]
pub struct EventStreamHub {
    sender: broadcast::Sender<SwarmEvent>,
}

impl EventStreamHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: SwarmEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.sender.subscribe()
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<SwarmEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }
}
