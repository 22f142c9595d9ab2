//! Error Handling Utilities
//!
//! The identity error taxonomy shared by every component, and the HTTP-facing
//! `AppError` that translates it into status codes.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;
use crate::models::credential::CredentialError;
use crate::service::mail::MailError;
use crate::service::token::TokenError;
use crate::store::StoreError;

/// Error kinds produced by the identity core
///
/// Each component reports the most specific kind it can determine; only
/// `Store` is a catch-all for transport and transaction failures.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Another account already uses this email address
    #[error("email already exists")]
    DuplicateEmail,

    /// Another account already uses this username
    #[error("username already exists")]
    DuplicateUsername,

    /// The record is absent, inactive, or its invitation expired
    #[error("record not found")]
    NotFound,

    /// Optimistic-concurrency version mismatch
    #[error("client conflict in versions")]
    Conflict,

    /// Request payload failed validation
    #[error("validation error: {0}")]
    Validation(String),

    /// The caller could not be identified
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller was identified but lacks the required role
    #[error("forbidden")]
    Forbidden,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Registration could not deliver the invitation message
    #[error("invitation delivery failed: {0}")]
    Mail(#[from] MailError),
}

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        IdentityError::Store(StoreError::Database(err))
    }
}

/// Result type for identity core operations
pub type IdentityResult<T> = Result<T, IdentityError>;

/// HTTP-facing error type returned by handlers and middleware
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed request that is not a field validation problem
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation errors for user input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., stale versions)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Generic internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::DuplicateEmail | IdentityError::DuplicateUsername => {
                AppError::BadRequest(err.to_string())
            }
            IdentityError::Validation(msg) => AppError::Validation(msg),
            IdentityError::NotFound => AppError::NotFound("Resource not found".to_string()),
            IdentityError::Conflict => AppError::Conflict(err.to_string()),
            IdentityError::Unauthorized(_) => {
                AppError::Authentication("Invalid credentials".to_string())
            }
            IdentityError::Forbidden => AppError::Forbidden("forbidden".to_string()),
            IdentityError::Mail(e) => {
                AppError::ExternalService(format!("unable to complete email sign up: {}", e))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Standard error response structure for API endpoints
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR", msg)
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::ExternalService(detail) => {
                error!("external service failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXTERNAL_SERVICE_ERROR",
                    "unable to complete email sign up".to_string(),
                )
            }
            AppError::Internal(detail) => {
                error!("internal server error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "The server encountered a problem".to_string(),
                )
            }
            AppError::Configuration(detail) => {
                error!("configuration error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "Server configuration error".to_string(),
                )
            }
        };

        let error_response = ErrorResponse::new(error_code, &message);
        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for operations that can return AppError
pub type AppResult<T> = Result<T, AppError>;
