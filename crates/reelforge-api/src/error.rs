//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use reelforge_models::PayloadError;
use reelforge_store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Payload(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(e) => match e {
                // Admission errors surface before any job-store mutation.
                StoreError::InsufficientBalance { .. } | StoreError::AccountNotFound(_) => {
                    StatusCode::PAYMENT_REQUIRED
                }
                StoreError::JobNotFound(_) => StatusCode::NOT_FOUND,
                StoreError::AlreadyClaimed { .. }
                | StoreError::InvalidTransition { .. }
                | StoreError::StaleClaim(_) => StatusCode::CONFLICT,
                StoreError::InvalidAmount(_) | StoreError::InvalidOperation(_) => {
                    StatusCode::BAD_REQUEST
                }
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse { detail };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_models::{JobId, JobStatus};

    #[test]
    fn test_store_error_status_mapping() {
        let cases = [
            (
                ApiError::from(StoreError::InsufficientBalance {
                    required: 6,
                    available: 2,
                }),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                ApiError::from(StoreError::JobNotFound(JobId::new())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(StoreError::InvalidTransition {
                    from: JobStatus::Completed,
                    to: JobStatus::Cancelled,
                }),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected);
        }
    }
}
