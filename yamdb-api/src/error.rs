//! HTTP error mapping
//!
//! Every handler returns [`ApiResult`]; the body shape is always
//! `{"error": {"code", "message", "fields"?}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use yamdb_common::permissions::Denied;
use yamdb_common::validation::FieldErrors;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Field-level validation failure (400)
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Missing or unusable credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden")]
    Forbidden,

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<yamdb_common::Error> for ApiError {
    fn from(err: yamdb_common::Error) -> Self {
        use yamdb_common::Error;

        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Validation(fields) => ApiError::Validation(fields),
            Error::Token(msg) => ApiError::Unauthorized(msg),
            other => {
                // Details stay in the log
                error!("Request failed: {}", other);
                ApiError::Internal("An internal error occurred".to_string())
            }
        }
    }
}

impl From<Denied> for ApiError {
    fn from(denied: Denied) -> Self {
        match denied {
            Denied::Unauthenticated => {
                ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
            }
            Denied::Forbidden => ApiError::Forbidden,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, fields) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Request data failed validation".to_string(),
                Some(fields),
            ),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You do not have permission to perform this action.".to_string(),
                None,
            ),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None)
            }
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(fields) = fields {
            error["fields"] = json!(fields);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
