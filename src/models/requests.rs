//! Request and Response Models
//!
//! Data structures for API request and response payloads with validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::account::Account;

/// Request payload for registering a new account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterAccountRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub username: String,

    #[validate(
        email(message = "must be a valid email address"),
        length(max = 255, message = "must be at most 255 characters")
    )]
    pub email: String,

    /// Plaintext secret; the byte bound is enforced again by the credential model
    #[validate(length(min = 3, max = 72, message = "must be between 3 and 72 characters"))]
    pub password: String,
}

/// Request payload for exchanging credentials for a bearer token
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTokenRequest {
    #[validate(
        email(message = "must be a valid email address"),
        length(max = 255, message = "must be at most 255 characters")
    )]
    pub email: String,

    #[validate(length(min = 3, max = 72, message = "must be between 3 and 72 characters"))]
    pub password: String,
}

/// Response for a successful registration
///
/// `token` is the plaintext invitation token; it is not persisted anywhere.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredAccountResponse {
    #[serde(flatten)]
    pub account: Account,
    pub token: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
