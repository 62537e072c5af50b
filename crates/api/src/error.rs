use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jailrun_core::scripting::outcome::{ErrorKind, OutcomeRecord};

/// Application-level error type for HTTP handlers.
///
/// Only covers failures that happen before a script reaches the execution
/// core. Everything the core produces is already an [`OutcomeRecord`].
/// Responses use the same JSON shape as execution outcomes so clients only
/// have to understand one body format.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The request did not carry a usable script.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The request body exceeded the configured limit.
    #[error("Request body too large")]
    PayloadTooLarge,

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, record) = match self {
            AppError::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                OutcomeRecord::failure(ErrorKind::InvalidInput, msg),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                OutcomeRecord::failure(ErrorKind::InvalidInput, "Request body too large"),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, internal_server_error())
            }
        };

        (status, axum::Json(record)).into_response()
    }
}

/// Sanitized record for failures outside the execution core.
pub fn internal_server_error() -> OutcomeRecord {
    OutcomeRecord::failure(ErrorKind::InternalServerError, "An internal error occurred")
}
