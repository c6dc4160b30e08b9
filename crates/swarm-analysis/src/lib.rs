//! # swarm-analysis: derived views over a run's events
//!
//! Every function here is pure over an arrival-ordered event slice and never
//! touches the run store.
//!
//! - [`timeline`]: display timeline, tool call/result pairing, agent labels
//! - [`summary`]: human-readable final summary from a finish message
//! - [`latency`]: segmented swarm vs. classic time estimate

pub mod latency;
pub mod summary;
pub mod timeline;

pub use latency::{
    AgentDuration, LatencyReport, SegmentReport, SegmentSpan, WorkerWindow, analyze_latency,
    partition_segments,
};
pub use summary::{extract_final_summary, final_summary};
pub use timeline::{AgentRoster, TimelineEntry, ToolOutcomeIndex, ToolState, compose_timeline};
