//! # swarm-protocol: swarm run event contract
//!
//! Shared types for the run reconstruction engine. Dependency-light so every
//! other crate (and any front end) can depend on it.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (RunId, AgentId)
//! - [`event`]: SwarmEvent, EventType (forward-compatible), EventTimestamp
//! - [`tokens`]: ProtocolTokens (status literals and orchestrator identity)
//! - [`error`]: SwarmError, NormalizeError, SwarmResult

pub mod error;
pub mod event;
pub mod ids;
pub mod tokens;

pub use error::{NormalizeError, SwarmError, SwarmResult};
pub use event::{
    EventTimestamp, EventType, OUTPUT_PREVIEW_KEY, SwarmEvent, TOOL_INDEX_KEY, parse_tool_index,
};
pub use ids::{AgentId, RunId};
pub use tokens::ProtocolTokens;
