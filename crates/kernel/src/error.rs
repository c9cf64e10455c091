//! Error types.
//!
//! [`HelperError`] covers the form guard and template renderer. [`AppError`]
//! is the HTTP-facing error used by the route handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised by the view helpers.
///
/// Tampered submissions are reported by verification's return value, not
/// through this type.
#[derive(Debug, Error)]
pub enum HelperError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("invalid field name {name:?}: {reason}")]
    InvalidFieldRegistration { name: String, reason: &'static str },

    #[error("failed to load templates: {0}")]
    TemplateLoad(String),
}

/// Result type alias using HelperError.
pub type HelperResult<T> = Result<T, HelperError>;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<HelperError> for AppError {
    fn from(e: HelperError) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
