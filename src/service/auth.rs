//! Authentication Service
//!
//! Exchanges an email and secret for a bearer token.

use std::sync::{Arc, OnceLock};

use log::{debug, info};

use crate::models::{Credential, CredentialError, IssuedToken};
use crate::service::token::TokenCodec;
use crate::store::IdentityStore;
use crate::utils::deadline::Deadline;
use crate::utils::error::{IdentityError, IdentityResult};
use crate::utils::security::{generate_secure_token, DEFAULT_BCRYPT_COST};

const INVALID_CREDENTIALS: &str = "invalid credentials";

pub struct AuthenticationService {
    store: Arc<dyn IdentityStore>,
    codec: TokenCodec,

    /// Verified against when no account matches, so unknown emails cost a
    /// full bcrypt round like known ones
    decoy: OnceLock<Credential>,
    bcrypt_cost: u32,
}

impl AuthenticationService {
    pub fn new(store: Arc<dyn IdentityStore>, codec: TokenCodec) -> Self {
        Self {
            store,
            codec,
            decoy: OnceLock::new(),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Cost factor of the decoy hash; match the cost accounts are hashed with
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    fn decoy(&self) -> IdentityResult<&Credential> {
        if let Some(decoy) = self.decoy.get() {
            return Ok(decoy);
        }
        let decoy = Credential::from_secret(&generate_secure_token(32), self.bcrypt_cost)?;
        Ok(self.decoy.get_or_init(|| decoy))
    }

    /// Verify the secret of an activated account and issue a bearer token
    ///
    /// An unknown or inactive account and a wrong secret produce the same
    /// `Unauthorized` error.
    pub async fn authenticate(&self, email: &str, secret: &str) -> IdentityResult<IssuedToken> {
        let found = match self
            .store
            .get_credentials_by_email(email, Deadline::query())
            .await
        {
            Ok(found) => found,
            Err(IdentityError::NotFound) => {
                // Burn the same bcrypt work a real mismatch would
                let _ = self.decoy()?.verify_secret(secret);
                debug!("authentication failed: no active account");
                return Err(invalid_credentials());
            }
            Err(e) => return Err(e),
        };

        // Out-of-bounds secrets can never match a stored hash
        let verified = match found.credential.verify_secret(secret) {
            Ok(verified) => verified,
            Err(CredentialError::EmptySecret | CredentialError::SecretTooLong(_)) => false,
            Err(e) => return Err(e.into()),
        };
        if !verified {
            debug!("authentication failed: secret mismatch account_id={}", found.account.id);
            return Err(invalid_credentials());
        }

        let token = self.codec.issue(found.account.id)?;
        info!("Issued bearer token account_id={}", found.account.id);
        Ok(token)
    }
}

fn invalid_credentials() -> IdentityError {
    IdentityError::Unauthorized(INVALID_CREDENTIALS.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::models::role::default_roles;
    use crate::models::{Credential, NewAccount};
    use crate::store::MemoryIdentityStore;

    fn codec() -> TokenCodec {
        TokenCodec::new(&AuthConfig {
            secret: "secret".to_string(),
            token_expires_hours: 1,
            issuer: "social-identity".to_string(),
            audience: "social-identity".to_string(),
        })
    }

    fn new_account() -> NewAccount {
        NewAccount {
            username: "alice".to_string(),
            email: "a@example.com".to_string(),
            credential: Credential::from_secret("hunter2", 4).unwrap(),
            role: default_roles().remove(0),
        }
    }

    #[tokio::test]
    async fn test_authenticate_issues_token_for_subject() {
        let store = Arc::new(MemoryIdentityStore::new());
        let alice = store.insert_active(&new_account()).unwrap();
        let service = AuthenticationService::new(store, codec()).with_bcrypt_cost(4);

        let issued = service.authenticate("a@example.com", "hunter2").await.unwrap();
        let claims = codec().validate(&issued.token).unwrap();
        assert_eq!(claims.sub, alice.id);
    }

    #[tokio::test]
    async fn test_wrong_secret_and_unknown_account_look_the_same() {
        let store = Arc::new(MemoryIdentityStore::new());
        store.insert_active(&new_account()).unwrap();
        let service = AuthenticationService::new(store, codec()).with_bcrypt_cost(4);

        let wrong_secret = service
            .authenticate("a@example.com", "wrong-secret")
            .await
            .unwrap_err();
        let unknown = service
            .authenticate("nobody@example.com", "hunter2")
            .await
            .unwrap_err();

        assert_eq!(wrong_secret.to_string(), unknown.to_string());
        assert!(matches!(wrong_secret, IdentityError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_pending_account_cannot_authenticate() {
        let store = Arc::new(MemoryIdentityStore::new());
        store
            .create_account(&new_account(), Deadline::query())
            .await
            .unwrap();
        let service = AuthenticationService::new(store, codec()).with_bcrypt_cost(4);

        let result = service.authenticate("a@example.com", "hunter2").await;
        assert!(matches!(result, Err(IdentityError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_oversized_secret_is_unauthorized() {
        let store = Arc::new(MemoryIdentityStore::new());
        store.insert_active(&new_account()).unwrap();
        let service = AuthenticationService::new(store, codec()).with_bcrypt_cost(4);

        let secret = "x".repeat(100);
        let result = service.authenticate("a@example.com", &secret).await;
        assert!(matches!(result, Err(IdentityError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_unknown_account_still_verifies_a_hash() {
        let store = Arc::new(MemoryIdentityStore::new());
        let service = AuthenticationService::new(store, codec()).with_bcrypt_cost(4);
        assert!(service.decoy.get().is_none());

        let result = service.authenticate("nobody@example.com", "hunter2").await;

        assert!(matches!(result, Err(IdentityError::Unauthorized(_))));
        let decoy = service.decoy.get().unwrap();
        assert!(decoy.hash().starts_with("$2"));
        assert!(decoy.hash().contains("$04$"));
    }
}
