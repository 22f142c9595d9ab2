//! Security Utilities
//!
//! Random token generation, bcrypt hashing, and SHA-256 digests.

use bcrypt::{hash, verify, DEFAULT_COST};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Default bcrypt cost for password hashing
pub const DEFAULT_BCRYPT_COST: u32 = DEFAULT_COST;

/// Length of generated invitation tokens (alphanumeric, ~190 bits of entropy)
pub const INVITATION_TOKEN_LENGTH: usize = 32;

/// Generate a cryptographically secure random string
pub fn generate_secure_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Hash a password with custom bcrypt cost
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

/// SHA-256 hex digest of sensitive data, used for token storage and lookup
pub fn hash_sensitive_data(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secure_token() {
        let token1 = generate_secure_token(INVITATION_TOKEN_LENGTH);
        let token2 = generate_secure_token(INVITATION_TOKEN_LENGTH);

        assert_eq!(token1.len(), 32);
        assert!(token1.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password_with_cost("test_password_123", 4).unwrap();

        assert_ne!(hash, "test_password_123");
        assert!(verify_password("test_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_hash_sensitive_data() {
        let hash1 = hash_sensitive_data("sensitive_data");
        let hash2 = hash_sensitive_data("sensitive_data");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_sensitive_data("other_data"));
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hash_sensitive_data("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
