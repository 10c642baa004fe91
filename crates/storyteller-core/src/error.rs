//! Domain error types.

use thiserror::Error;

use crate::phase::Phase;

/// Failures surfaced by a generation client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// No bearer credential was configured. No request was attempted.
    #[error("generation credential is not configured")]
    CredentialMissing,

    /// The request could not be completed (transport error or non-success
    /// status).
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The service replied, but the reply did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Machine-readable kind, stable across releases.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::CredentialMissing => "credential_missing",
            GenerationError::NetworkFailure(_) => "network_failure",
            GenerationError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Errors returned by session operations.
#[derive(Debug, Error)]
pub enum StoryError {
    /// An index argument was outside the bounds of the list it selects from.
    /// This is a caller bug; session state is left untouched.
    #[error("index {index} out of range for {len} options")]
    IndexOutOfRange {
        /// The index that was passed.
        index: usize,
        /// Length of the list at the time of the call.
        len: usize,
    },

    /// The operation is not valid in the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        /// The rejected operation.
        action: &'static str,
        /// The state the session was in.
        state: &'static str,
    },

    /// A retry was requested but no phase has a pending failure.
    #[error("no failed request to retry")]
    NothingToRetry,

    /// The engine event loop is no longer running.
    #[error("story engine is not running")]
    EngineStopped,
}

/// A failure recorded against one phase of the current turn.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TurnError {
    /// The phase whose request failed.
    pub phase: Phase,
    /// Machine-readable kind (see [`GenerationError::kind`]).
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl TurnError {
    /// Records `error` against `phase`.
    #[must_use]
    pub fn new(phase: Phase, error: &GenerationError) -> Self {
        Self {
            phase,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
