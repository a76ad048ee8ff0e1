//! # Application Error
//!
//! Maps engine errors to structured HTTP responses. The body shape is what
//! the portal expects: `{success: false, message}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use sambaza_engine::EngineError;
use sambaza_store::StoreError;

/// Application-level error type that maps to HTTP responses.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request validation failed.
    #[error("{0}")]
    Validation(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An upstream (the payment rail) refused the request.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal server error.
    #[error("internal error")]
    Internal(anyhow::Error),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            e if e.is_client_error() => AppError::Validation(e.to_string()),
            EngineError::PushRejected(inner) => AppError::Upstream(inner.to_string()),
            EngineError::Store(StoreError::NotFound(id)) => AppError::NotFound(id),
            other => AppError::Internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Internal details stay in the logs, not the body.
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "success": false,
            "message": message,
        });
        (status, axum::Json(body)).into_response()
    }
}
