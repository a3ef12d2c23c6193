// crates/relay-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Relay error taxonomy.
///
/// `NoActiveMatch` and `NotFound` are expected during teardown races and are
/// handled as no-ops; `NotCounterpart` should be unreachable with
/// server-derived routing and is logged as an integrity violation.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No active match for this participant")]
    NoActiveMatch,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Payload addressed to a party outside the match")]
    NotCounterpart,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::NotFound(_) | RelayError::NoActiveMatch => StatusCode::NOT_FOUND,
            RelayError::InvalidState(_) => StatusCode::CONFLICT,
            RelayError::NotCounterpart => StatusCode::FORBIDDEN,
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayError::NotFound(_) => "NOT_FOUND",
            RelayError::NoActiveMatch => "NO_ACTIVE_MATCH",
            RelayError::InvalidState(_) => "INVALID_STATE",
            RelayError::NotCounterpart => "NOT_COUNTERPART",
            RelayError::InvalidInput(_) => "INVALID_INPUT",
            RelayError::Io(_) => "IO",
            RelayError::Json(_) => "JSON",
            RelayError::Internal(_) => "INTERNAL",
        }
    }

    /// Errors that arise from ordinary teardown races. These are dropped
    /// with a debug log instead of being surfaced to the client.
    pub fn is_benign(&self) -> bool {
        matches!(self, RelayError::NoActiveMatch | RelayError::NotFound(_))
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            RelayError::NotFound(_) => "Resource not found".to_string(),
            RelayError::NoActiveMatch => "No active match".to_string(),
            RelayError::InvalidState(_) => {
                "Operation not valid in the current call state".to_string()
            },
            RelayError::NotCounterpart => "Invalid message target".to_string(),
            RelayError::InvalidInput(_) => "Invalid input provided".to_string(),
            RelayError::Io(_) => "Internal server error".to_string(),
            RelayError::Json(_) => "Invalid request format".to_string(),
            RelayError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RelayError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RelayError::Internal("Failed to send message".to_string())
    }
}

impl From<String> for RelayError {
    fn from(msg: String) -> Self {
        RelayError::Internal(msg)
    }
}

impl From<crate::validation::ValidationError> for RelayError {
    fn from(err: crate::validation::ValidationError) -> Self {
        RelayError::InvalidInput(err.to_string())
    }
}
