//! Application Error Types
//!
//! Centralized error handling with Axum integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },
}

impl AppError {
    /// Validation failure without per-field detail.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Map a unique-index violation to `Conflict`, keep everything else as a database error.
    pub fn from_unique_violation(err: sqlx::Error, conflict_message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(conflict_message.to_string())
            }
            _ => AppError::Database(err),
        }
    }

    /// Map a foreign-key violation (restricted delete) to `Conflict`.
    pub fn from_foreign_key_violation(err: sqlx::Error, conflict_message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::Conflict(conflict_message.to_string())
            }
            _ => AppError::Database(err),
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) | AppError::Database(_) | AppError::Redis(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Field-level validation error
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message, errors) = match self {
            AppError::NotFound(msg) => (10001, msg, None),
            AppError::BadRequest(msg) => (10002, msg, None),
            AppError::Unauthorized(msg) => (10003, msg, None),
            AppError::Forbidden(msg) => (10004, msg, None),
            AppError::Conflict(msg) => (10005, msg, None),
            AppError::RateLimited => (10006, "Rate limited".into(), None),
            AppError::Validation { message, errors } => {
                let errors = if errors.is_empty() { None } else { Some(errors) };
                (10007, message, errors)
            }
            AppError::PayloadTooLarge(msg) => (10008, msg, None),
            AppError::Unavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (10009, msg, None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (10000, "Internal server error".into(), None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (10000, "Internal server error".into(), None)
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                (10000, "Internal server error".into(), None)
            }
        };

        let body = ErrorResponse {
            code,
            message,
            errors,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_message_is_masked() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_non_database_error_passes_through_unique_mapping() {
        let err = AppError::from_unique_violation(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(err, AppError::Database(sqlx::Error::RowNotFound)));
    }
}
