//! Error types for the swarm protocol.

use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Reasons a raw payload is rejected by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("payload is not valid json: {0}")]
    InvalidJson(String),
    #[error("payload is not a json object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field {field} has unexpected shape: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Convenience result type for engine operations.
pub type SwarmResult<T> = Result<T, SwarmError>;
