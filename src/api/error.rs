//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::export::ExportError;
use crate::pipeline::PipelineError;
use crate::session::{SessionError, TransitionError};

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Upload(#[from] PipelineError),
    #[error("File size exceeds {limit_mb}MB limit.")]
    BodyTooLarge { limit_mb: usize },
    #[error("{0}")]
    Conflict(TransitionError),
    #[error("{0}")]
    OutOfBounds(TransitionError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::Upload(err) => {
                let status = match err {
                    PipelineError::UnsupportedFormat => StatusCode::BAD_REQUEST,
                    PipelineError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (status, err.code(), err.to_string())
            }
            ApiError::BodyTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE", self.to_string())
            }
            ApiError::Conflict(err) => {
                let code = match err {
                    TransitionError::Busy => "BUSY",
                    TransitionError::NoTable => "NO_TABLE",
                    _ => "CONFLICT",
                };
                (StatusCode::CONFLICT, code, err.to_string())
            }
            ApiError::OutOfBounds(err) => (StatusCode::BAD_REQUEST, "OUT_OF_BOUNDS", err.to_string()),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Grid(_) => ApiError::OutOfBounds(err),
            _ => ApiError::Conflict(err),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Transition(e) => e.into(),
            SessionError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
