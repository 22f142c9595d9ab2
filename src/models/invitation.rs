//! Invitation Model
//!
//! Plaintext invitation tokens, their SHA-256 digests, and the stored
//! invitation record.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::utils::security::{generate_secure_token, hash_sensitive_data, INVITATION_TOKEN_LENGTH};

/// Plaintext invitation token handed to the account holder
///
/// Only ever travels outward (activation link, registration response); the
/// store receives its `TokenHash`.
#[derive(Clone, PartialEq, Eq)]
pub struct InvitationToken(String);

impl InvitationToken {
    pub fn generate() -> Self {
        Self(generate_secure_token(INVITATION_TOKEN_LENGTH))
    }

    /// Wrap a token presented by a client
    pub fn from_plaintext(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn hash(&self) -> TokenHash {
        TokenHash::of(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for InvitationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InvitationToken(<redacted>)")
    }
}

/// Hex-encoded SHA-256 digest of an invitation token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenHash(String);

impl TokenHash {
    pub fn of(plaintext: &str) -> Self {
        Self(hash_sensitive_data(plaintext))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Pending invitation as stored in `user_invitations`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub token_hash: TokenHash,
    pub account_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
