//! Typed API error for HTTP handlers.
//!
//! Converts service errors into JSON responses, `{"error": "message"}`, with a
//! status code per failure mode.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use notescan_service::ServiceError;
use notescan_storage::StorageError;

/// `Internal` logs the real error server-side and returns a static message to
/// the client.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request: invalid input from caller.
    BadRequest(String),
    /// 403 Forbidden: destructive action without confirmation.
    Forbidden(String),
    /// 404 Not Found: requested record doesn't exist.
    NotFound(String),
    /// 409 Conflict: edit would duplicate another record's serial.
    Conflict(String),
    /// 413 Payload Too Large: upload exceeds the body limit.
    PayloadTooLarge(String),
    /// 500 Internal Server Error: unexpected failure. Details logged, not exposed.
    Internal(anyhow::Error),
    /// 503 Service Unavailable: a wipe or conflicting write is in flight.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            Self::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            },
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        let body = serde_json::json!({"error": message});
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::BadRequest(format!("malformed multipart body: {}", err.body_text()))
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(StorageError::NotFound { entity, id }) => {
                Self::NotFound(format!("{entity} '{id}' not found"))
            },
            ServiceError::InvalidInput(msg) => Self::BadRequest(msg),
            ServiceError::Conflict(msg) => Self::Conflict(msg),
            ServiceError::ConfirmationRequired(msg) => Self::Forbidden(msg),
            ServiceError::Busy(msg) => Self::ServiceUnavailable(msg.to_owned()),
            ServiceError::Storage(StorageError::Unsupported(msg)) => Self::BadRequest(msg.to_owned()),
            _ => Self::Internal(err.into()),
        }
    }
}
