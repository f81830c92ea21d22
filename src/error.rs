//! Custom error types and handling
//!
//! This module defines the application's error types and implements
//! conversion to HTTP responses for the Axum framework.
//!
//! A graded "incorrect" answer is never an error: it travels as a normal
//! `GradeResult`. Errors here are reserved for requests the grader cannot
//! serve at all.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Request errors
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Execution errors
    #[error("Docker error: {0}")]
    Docker(String),

    #[error("Execution error: {0}")]
    Execution(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in response
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl AppError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Docker(_) => "DOCKER_ERROR",
            Self::Execution(_) => "EXECUTION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedLanguage(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Docker(_) | Self::Execution(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Log internal errors but don't expose details to clients
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "An internal error occurred".to_string()
            }
            AppError::Docker(e) => {
                tracing::error!("Docker error: {}", e);
                "The execution backend failed".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code: self.error_code().to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<bollard::errors::Error> for AppError {
    fn from(err: bollard::errors::Error) -> Self {
        AppError::Docker(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_language_is_client_error() {
        let err = AppError::UnsupportedLanguage("cobol".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "UNSUPPORTED_LANGUAGE");
        assert_eq!(err.to_string(), "Unsupported language: cobol");
    }

    #[test]
    fn test_backend_failures_are_server_errors() {
        let docker = AppError::Docker("connection refused".to_string());
        assert_eq!(docker.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let internal = AppError::from(anyhow::anyhow!("boom"));
        assert_eq!(internal.error_code(), "INTERNAL_ERROR");
        assert_eq!(internal.to_string(), "Internal server error");
    }
}
