//! Storyteller — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use storyteller_core::error::StoryError;
use storyteller_generation::ConfigError;
use storyteller_narrative::application::config::EngineConfigError;
use thiserror::Error;
use uuid::Uuid;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The generation client could not be configured.
    #[error("generation configuration error: {0}")]
    Generation(#[from] ConfigError),

    /// Engine tunables could not be read.
    #[error("engine configuration error: {0}")]
    Engine(#[from] EngineConfigError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer error that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No story is registered under the id.
    #[error("story {0} not found")]
    SessionNotFound(Uuid),

    /// The session rejected the operation.
    #[error(transparent)]
    Story(#[from] StoryError),

    /// Shared server state is unusable.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
            ApiError::Story(StoryError::IndexOutOfRange { .. }) => {
                (StatusCode::BAD_REQUEST, "index_out_of_range")
            }
            ApiError::Story(StoryError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, "invalid_transition")
            }
            ApiError::Story(StoryError::NothingToRetry) => (StatusCode::CONFLICT, "nothing_to_retry"),
            ApiError::Story(StoryError::EngineStopped) => {
                (StatusCode::SERVICE_UNAVAILABLE, "engine_stopped")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorBody {
            error: error_code,
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
