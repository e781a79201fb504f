//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same JSON error body and maps the
//! domain errors of the other crates to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use helpdesk_chat::{ChatError, ResolveError};
use helpdesk_core::error::HelpdeskError;
use serde::Serialize;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 401 Unauthorized - missing or unknown login token.
    Unauthorized(String),
    /// 403 Forbidden - logged in, but the role does not allow this.
    Forbidden(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 409 Conflict - state conflict (duplicate entry, nothing pending).
    Conflict(String),
    /// 422 Unprocessable Entity - valid syntax but semantic validation failure.
    UnprocessableEntity(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - feature disabled.
    ServiceUnavailable(String),
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<HelpdeskError> for ApiError {
    fn from(err: HelpdeskError) -> Self {
        match err {
            HelpdeskError::Validation(msg) => ApiError::UnprocessableEntity(msg),
            HelpdeskError::InvalidKnowledgeBase(msg) => ApiError::UnprocessableEntity(msg),
            HelpdeskError::DuplicateEntry(key) => {
                ApiError::Conflict(format!("knowledge entry '{}' already exists", key))
            }
            HelpdeskError::EntryNotFound(key) => {
                ApiError::NotFound(format!("knowledge entry '{}' not found", key))
            }
            HelpdeskError::TicketNotFound(index) => {
                ApiError::NotFound(format!("ticket {} not found", index))
            }
            HelpdeskError::Config(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match err {
            ChatError::Disabled => ApiError::ServiceUnavailable(message),
            ChatError::MessageTooLong(_) => ApiError::BadRequest(message),
            ChatError::SessionNotFound(_) => ApiError::NotFound(message),
            ChatError::NoPendingChoices(_) => ApiError::Conflict(message),
            ChatError::SelectionNotOffered(_) => ApiError::UnprocessableEntity(message),
            ChatError::Config(_) | ChatError::StorageError(_) => ApiError::Internal(message),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        let message = err.to_string();
        match err {
            ResolveError::InvalidQuery(_) => ApiError::BadRequest(message),
            ResolveError::InvalidKnowledgeBase(_) => ApiError::UnprocessableEntity(message),
        }
    }
}
