//! Credential Model
//!
//! Salted bcrypt hash of an account secret. The plaintext only exists for the
//! duration of the call that hashes or verifies it.

use std::fmt;

use thiserror::Error;

use crate::utils::security::{hash_password_with_cost, verify_password};

/// bcrypt only considers the first 72 bytes of input
pub const MAX_SECRET_BYTES: usize = 72;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("secret must not be empty")]
    EmptySecret,

    #[error("secret is {0} bytes, the maximum is {MAX_SECRET_BYTES}")]
    SecretTooLong(usize),

    #[error("credential hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

/// A one-way hashed secret as stored in `accounts.password_hash`
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    hash: String,
}

impl Credential {
    /// Hash `plaintext` with the given bcrypt cost factor
    pub fn from_secret(plaintext: &str, cost: u32) -> Result<Self, CredentialError> {
        check_bounds(plaintext)?;
        let hash = hash_password_with_cost(plaintext, cost)?;
        Ok(Self { hash })
    }

    /// Wrap a hash loaded from the store
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    /// Recompute and compare against the stored hash
    pub fn verify_secret(&self, plaintext: &str) -> Result<bool, CredentialError> {
        check_bounds(plaintext)?;
        Ok(verify_password(plaintext, &self.hash)?)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

fn check_bounds(plaintext: &str) -> Result<(), CredentialError> {
    match plaintext.len() {
        0 => Err(CredentialError::EmptySecret),
        n if n > MAX_SECRET_BYTES => Err(CredentialError::SecretTooLong(n)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_secret_round_trip() {
        let credential = Credential::from_secret("hunter2", TEST_COST).unwrap();

        assert_ne!(credential.hash(), "hunter2");
        assert!(credential.verify_secret("hunter2").unwrap());
        assert!(!credential.verify_secret("hunter3").unwrap());
    }

    #[test]
    fn test_same_secret_gets_distinct_salts() {
        let a = Credential::from_secret("hunter2", TEST_COST).unwrap();
        let b = Credential::from_secret("hunter2", TEST_COST).unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            Credential::from_secret("", TEST_COST),
            Err(CredentialError::EmptySecret)
        ));
    }

    #[test]
    fn test_secret_length_bound_is_in_bytes() {
        let at_limit = "a".repeat(MAX_SECRET_BYTES);
        assert!(Credential::from_secret(&at_limit, TEST_COST).is_ok());

        // 37 two-byte characters = 74 bytes
        let multibyte = "é".repeat(37);
        assert!(matches!(
            Credential::from_secret(&multibyte, TEST_COST),
            Err(CredentialError::SecretTooLong(74))
        ));
    }

    #[test]
    fn test_unsupported_cost_fails() {
        assert!(matches!(
            Credential::from_secret("hunter2", 2),
            Err(CredentialError::Hashing(_))
        ));
    }

    #[test]
    fn test_debug_redacts_hash() {
        let credential = Credential::from_hash("$2b$04$secret");
        assert_eq!(format!("{:?}", credential), "Credential(<redacted>)");
    }

    #[test]
    fn test_verify_against_malformed_hash_fails() {
        let credential = Credential::from_hash("not-a-bcrypt-hash");
        assert!(credential.verify_secret("hunter2").is_err());
    }
}
