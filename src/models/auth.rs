//! Authentication Models
//!
//! Bearer token claims and the token issued to authenticated accounts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signed claim set carried by bearer tokens
///
/// `sub` is the account identifier as an exact integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerClaims {
    /// Subject - account ID
    pub sub: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,

    /// JWT ID - unique token identifier
    pub jti: String,
}

impl BearerClaims {
    pub fn new(
        account_id: i64,
        issued_at: DateTime<Utc>,
        expires_in: Duration,
        issuer: &str,
        audience: &str,
    ) -> Self {
        Self {
            sub: account_id,
            exp: (issued_at + expires_in).timestamp(),
            iat: issued_at.timestamp(),
            nbf: issued_at.timestamp(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// Bearer token returned by the authentication endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,

    /// Always "Bearer"
    pub token_type: String,

    /// Seconds until expiry
    pub expires_in: i64,
}

impl IssuedToken {
    pub fn new(token: String, expires_in: i64) -> Self {
        Self {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
