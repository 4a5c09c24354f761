use crate::chat::ChatError;
use crate::media::RangeError;
use crate::storage::WriteError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced to HTTP clients.
///
/// Validation messages are returned as-is. Failures of the chat API or
/// FFmpeg are logged with full detail and answered with a fixed message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Chat service is not configured")]
    ChatUnavailable,

    #[error("Chat service request failed")]
    ChatFailed(#[source] ChatError),

    #[error("Failed to {operation}")]
    Internal {
        operation: &'static str,
        cause: anyhow::Error,
    },
}

impl ApiError {
    pub fn internal(operation: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        ApiError::Internal {
            operation,
            cause: cause.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ChatUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ChatFailed(_) | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::ChatFailed(cause) => error!(error = %cause, "Chat request failed"),
            ApiError::Internal { operation, cause } => {
                error!(operation, error = ?cause, "Request failed")
            }
            _ => {}
        }

        let body = Json(json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::NotConfigured => ApiError::ChatUnavailable,
            other => ApiError::ChatFailed(other),
        }
    }
}

impl From<RangeError> for ApiError {
    fn from(error: RangeError) -> Self {
        ApiError::BadRequest(error.to_string())
    }
}

impl From<WriteError> for ApiError {
    fn from(error: WriteError) -> Self {
        match error {
            WriteError::TooLarge { .. } => ApiError::PayloadTooLarge(error.to_string()),
            WriteError::Body(_) => ApiError::BadRequest(error.to_string()),
            WriteError::Io(io) => ApiError::internal("save upload", io),
        }
    }
}
