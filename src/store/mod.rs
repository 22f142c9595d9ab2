//! Identity Store
//!
//! Relational persistence for accounts, roles, and pending invitations.
//! `PgIdentityStore` is the live backend; `MemoryIdentityStore` is a
//! deterministic double with the same transactional guarantees.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Account, AccountWithCredential, NewAccount, Role, TokenHash};
use crate::utils::deadline::{Deadline, Elapsed};
use crate::utils::error::IdentityResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryIdentityStore;
pub use postgres::PgIdentityStore;

/// Transport and transaction failures of the store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<Elapsed> for StoreError {
    fn from(elapsed: Elapsed) -> Self {
        StoreError::Timeout(elapsed.budget)
    }
}

/// Account and invitation persistence
///
/// Lookups only ever return activated accounts. Every operation is bounded
/// by the supplied deadline; multi-step operations run in one transaction.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert an account; `DuplicateEmail`/`DuplicateUsername` on uniqueness violations
    async fn create_account(&self, account: &NewAccount, deadline: Deadline)
        -> IdentityResult<Account>;

    /// Activated account with its role
    async fn get_by_id(&self, id: i64, deadline: Deadline) -> IdentityResult<Account>;

    /// Activated account with its role
    async fn get_by_email(&self, email: &str, deadline: Deadline) -> IdentityResult<Account>;

    /// Activated account plus its credential, for authentication only
    async fn get_credentials_by_email(
        &self,
        email: &str,
        deadline: Deadline,
    ) -> IdentityResult<AccountWithCredential>;

    /// Create the account and its invitation atomically
    async fn create_and_invite(
        &self,
        account: &NewAccount,
        token_hash: &TokenHash,
        expires_at: DateTime<Utc>,
        deadline: Deadline,
    ) -> IdentityResult<Account>;

    /// Redeem an unexpired invitation: mark the owner active and delete the
    /// invitation in one transaction. Returns the activated account id.
    async fn activate(&self, token_hash: &TokenHash, deadline: Deadline) -> IdentityResult<i64>;

    /// Delete the account and any invitation it still has.
    /// `NotFound` if the account does not exist.
    async fn delete_account(&self, id: i64, deadline: Deadline) -> IdentityResult<()>;

    async fn health_check(&self, deadline: Deadline) -> IdentityResult<()>;
}

/// Read access to the role table
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get_role_by_name(&self, name: &str, deadline: Deadline) -> IdentityResult<Role>;

    async fn list_roles(&self, deadline: Deadline) -> IdentityResult<Vec<Role>>;
}

/// Unique constraint names on `accounts`
pub(crate) const EMAIL_CONSTRAINT: &str = "accounts_email_key";
pub(crate) const USERNAME_CONSTRAINT: &str = "accounts_username_key";
