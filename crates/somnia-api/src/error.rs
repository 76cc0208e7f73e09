//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping chat and analytics errors to HTTP status codes.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use somnia_chat::ChatError;
use somnia_insight::InsightError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 403 Forbidden - resource belongs to another user.
    Forbidden(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - feature switched off.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::Disabled => ApiError::ServiceUnavailable(err.to_string()),
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) | ChatError::InvalidUserId(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::ConversationOwnerMismatch(_) => ApiError::Forbidden(err.to_string()),
            ChatError::ConversationNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::InvalidTransition(..) | ChatError::Storage(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<InsightError> for ApiError {
    fn from(err: InsightError) -> Self {
        match &err {
            InsightError::InvalidWindow { .. }
            | InsightError::InvalidLimit { .. }
            | InsightError::UnsupportedFormat(_)
            | InsightError::UnsupportedInterval(_) => ApiError::BadRequest(err.to_string()),
            InsightError::UserNotFound(_) | InsightError::ConversationNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            InsightError::Export(_) | InsightError::Storage(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}
