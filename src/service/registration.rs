//! Registration Service
//!
//! Drives account creation as a saga: persist the pending account with its
//! invitation, then dispatch the invitation message. When dispatch fails the
//! pending account is deleted again.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde_json::json;

use crate::config::{InvitationConfig, ServerConfig};
use crate::models::{
    Account, Credential, CredentialError, InvitationToken, NewAccount, RegisterAccountRequest,
    RoleHierarchy, TokenHash,
};
use crate::service::mail::{is_success, MailError, Mailer, USER_INVITATION_TEMPLATE};
use crate::service::saga::{Saga, SagaContext, SagaStep};
use crate::store::IdentityStore;
use crate::utils::deadline::Deadline;
use crate::utils::error::{IdentityError, IdentityResult};
use crate::utils::security::DEFAULT_BCRYPT_COST;
use crate::utils::validation::validate_request;

/// Registration in progress
struct PendingRegistration {
    account: NewAccount,
    token: InvitationToken,
    token_hash: TokenHash,
    expires_at: DateTime<Utc>,
    created: Option<Account>,
}

impl SagaContext for PendingRegistration {
    fn account_id(&self) -> Option<i64> {
        self.created.as_ref().map(|account| account.id)
    }
}

struct CreateAndInvite {
    store: Arc<dyn IdentityStore>,
}

#[async_trait]
impl SagaStep<PendingRegistration> for CreateAndInvite {
    fn name(&self) -> &'static str {
        "create_and_invite"
    }

    async fn execute(&self, ctx: &mut PendingRegistration) -> IdentityResult<()> {
        let created = self
            .store
            .create_and_invite(&ctx.account, &ctx.token_hash, ctx.expires_at, Deadline::query())
            .await?;
        info!("Created pending account account_id={}", created.id);
        ctx.created = Some(created);
        Ok(())
    }

    async fn compensate(&self, ctx: &PendingRegistration) -> IdentityResult<()> {
        let Some(account) = &ctx.created else {
            return Ok(());
        };

        match self.store.delete_account(account.id, Deadline::query()).await {
            // Already gone, nothing left to undo
            Err(IdentityError::NotFound) => Ok(()),
            other => other,
        }
    }
}

struct SendInvitation {
    mailer: Arc<dyn Mailer>,
    server: ServerConfig,
}

#[async_trait]
impl SagaStep<PendingRegistration> for SendInvitation {
    fn name(&self) -> &'static str {
        "send_invitation"
    }

    async fn execute(&self, ctx: &mut PendingRegistration) -> IdentityResult<()> {
        let vars = json!({
            "username": ctx.account.username,
            "activation_url": self.server.activation_url(ctx.token.as_str()),
        });

        let status = self
            .mailer
            .send(
                USER_INVITATION_TEMPLATE,
                &ctx.account.username,
                &ctx.account.email,
                &vars,
                !self.server.is_production(),
            )
            .await?;

        if !is_success(status) {
            return Err(MailError::Rejected(status).into());
        }

        info!("Invitation dispatched to {} with status {}", ctx.account.email, status);
        Ok(())
    }

    async fn compensate(&self, _ctx: &PendingRegistration) -> IdentityResult<()> {
        // A sent message cannot be recalled
        Ok(())
    }
}

/// Account registration and activation
pub struct RegistrationService {
    store: Arc<dyn IdentityStore>,
    hierarchy: Arc<RoleHierarchy>,
    saga: Saga<PendingRegistration>,
    invitation: InvitationConfig,
    bcrypt_cost: u32,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        mailer: Arc<dyn Mailer>,
        hierarchy: Arc<RoleHierarchy>,
        server: ServerConfig,
        invitation: InvitationConfig,
    ) -> Self {
        let saga = Saga::new("registration")
            .step(CreateAndInvite {
                store: Arc::clone(&store),
            })
            .step(SendInvitation { mailer, server });

        Self {
            store,
            hierarchy,
            saga,
            invitation,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Override the bcrypt cost factor
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Register a pending account and send its invitation
    ///
    /// Returns the created account and the plaintext invitation token. The
    /// token is not persisted anywhere; only its hash is stored.
    pub async fn register(
        &self,
        request: RegisterAccountRequest,
    ) -> IdentityResult<(Account, InvitationToken)> {
        validate_request(&request)?;

        let credential =
            Credential::from_secret(&request.password, self.bcrypt_cost).map_err(|e| match e {
                CredentialError::EmptySecret | CredentialError::SecretTooLong(_) => {
                    IdentityError::Validation(format!("password: {}", e))
                }
                other => other.into(),
            })?;
        let token = InvitationToken::generate();

        let mut pending = PendingRegistration {
            account: NewAccount {
                username: request.username,
                email: request.email,
                credential,
                role: self.hierarchy.lowest().clone(),
            },
            token_hash: token.hash(),
            token,
            expires_at: Utc::now() + self.invitation.lifetime(),
            created: None,
        };

        self.saga.run(&mut pending).await?;

        let account = pending.created.ok_or(IdentityError::NotFound)?;
        Ok((account, pending.token))
    }

    /// Redeem a plaintext invitation token, returning the activated account id
    pub async fn activate(&self, token: &str) -> IdentityResult<i64> {
        let token = InvitationToken::from_plaintext(token);
        let account_id = self.store.activate(&token.hash(), Deadline::query()).await?;
        info!("Activated account account_id={}", account_id);
        Ok(account_id)
    }
}
