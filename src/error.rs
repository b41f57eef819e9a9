//! Error types for scmi-clock.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::transport::TransportError;

/// Main error type for all clock protocol operations.
#[derive(Debug, Error)]
pub enum ClockError {
    /// Out-of-range clock index, event kind, parent index or target state.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Clock slot exists but was never successfully described.
    #[error("Clock {0} not found")]
    NotFound(u32),

    /// Firmware permissions forbid the requested control.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Response shape violates the protocol and could not be repaired.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Allocation failure while sizing a result buffer.
    #[error("Out of memory: {0}")]
    ResourceExhausted(#[from] TryReserveError),

    /// Error reported by the underlying transport, passed through unchanged.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// JSON serialization error (registry summary only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ClockError.
pub type Result<T> = std::result::Result<T, ClockError>;
