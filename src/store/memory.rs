//! In-memory identity store
//!
//! Holds accounts, roles, and invitations behind a single mutex so every
//! operation is atomic, mirroring the transactional behaviour of the
//! PostgreSQL store. Used by the service and HTTP tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::role::default_roles;
use crate::models::{
    Account, AccountWithCredential, Credential, Invitation, NewAccount, Role, TokenHash,
};
use crate::store::{IdentityStore, RoleStore, StoreError};
use crate::utils::deadline::Deadline;
use crate::utils::error::{IdentityError, IdentityResult};

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    credential: Credential,
}

#[derive(Default)]
struct State {
    accounts: HashMap<i64, StoredAccount>,
    invitations: HashMap<TokenHash, Invitation>,
    roles: Vec<Role>,
    next_id: i64,
}

impl State {
    fn check_unique(&self, account: &NewAccount) -> IdentityResult<()> {
        let stored = self.accounts.values().map(|s| &s.account);
        let mut email_taken = false;
        let mut username_taken = false;
        for existing in stored {
            email_taken |= existing.email == account.email;
            username_taken |= existing.username == account.username;
        }

        if email_taken {
            Err(IdentityError::DuplicateEmail)
        } else if username_taken {
            Err(IdentityError::DuplicateUsername)
        } else {
            Ok(())
        }
    }

    fn insert(&mut self, account: &NewAccount) -> IdentityResult<Account> {
        self.check_unique(account)?;

        self.next_id += 1;
        let created = Account {
            id: self.next_id,
            username: account.username.clone(),
            email: account.email.clone(),
            created_at: Utc::now(),
            is_active: false,
            role: account.role.clone(),
        };
        self.accounts.insert(
            created.id,
            StoredAccount {
                account: created.clone(),
                credential: account.credential.clone(),
            },
        );
        Ok(created)
    }

    fn active_by_email(&self, email: &str) -> Option<&StoredAccount> {
        self.accounts
            .values()
            .find(|s| s.account.is_active && s.account.email == email)
    }
}

/// Deterministic `IdentityStore` double
#[derive(Default)]
pub struct MemoryIdentityStore {
    state: Mutex<State>,
    fail_deletes: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryIdentityStore {
    /// Empty store seeded with the default role set
    pub fn new() -> Self {
        Self::with_roles(default_roles())
    }

    pub fn with_roles(roles: Vec<Role>) -> Self {
        Self {
            state: Mutex::new(State {
                roles,
                ..State::default()
            }),
            ..Self::default()
        }
    }

    /// Delay every operation by `latency` before touching state
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make `delete_account` fail with a transport error
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Account regardless of activation state
    pub fn raw_account(&self, id: i64) -> Option<Account> {
        self.lock().ok()?.accounts.get(&id).map(|s| s.account.clone())
    }

    /// Pending invitation owned by `account_id`, if any
    pub fn invitation_for(&self, account_id: i64) -> Option<Invitation> {
        self.lock()
            .ok()?
            .invitations
            .values()
            .find(|inv| inv.account_id == account_id)
            .cloned()
    }

    pub fn account_count(&self) -> usize {
        self.lock().map(|s| s.accounts.len()).unwrap_or(0)
    }

    /// Insert an already-activated account, bypassing the invitation flow
    pub fn insert_active(&self, account: &NewAccount) -> IdentityResult<Account> {
        let mut state = self.lock()?;
        let created = state.insert(account)?;
        let stored = state
            .accounts
            .get_mut(&created.id)
            .ok_or(IdentityError::NotFound)?;
        stored.account.is_active = true;
        Ok(stored.account.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("identity store lock poisoned".to_string()))
    }

    async fn bounded<T, F>(&self, deadline: Deadline, op: F) -> IdentityResult<T>
    where
        F: FnOnce(&mut State) -> IdentityResult<T> + Send,
        T: Send,
    {
        let latency = self.latency;
        deadline
            .run(async move {
                if let Some(latency) = latency {
                    tokio::time::sleep(latency).await;
                }
                let mut state = self.lock()?;
                op(&mut state)
            })
            .await
            .map_err(StoreError::from)?
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn create_account(
        &self,
        account: &NewAccount,
        deadline: Deadline,
    ) -> IdentityResult<Account> {
        self.bounded(deadline, |state| state.insert(account)).await
    }

    async fn get_by_id(&self, id: i64, deadline: Deadline) -> IdentityResult<Account> {
        self.bounded(deadline, |state| {
            state
                .accounts
                .get(&id)
                .filter(|s| s.account.is_active)
                .map(|s| s.account.clone())
                .ok_or(IdentityError::NotFound)
        })
        .await
    }

    async fn get_by_email(&self, email: &str, deadline: Deadline) -> IdentityResult<Account> {
        self.bounded(deadline, |state| {
            state
                .active_by_email(email)
                .map(|s| s.account.clone())
                .ok_or(IdentityError::NotFound)
        })
        .await
    }

    async fn get_credentials_by_email(
        &self,
        email: &str,
        deadline: Deadline,
    ) -> IdentityResult<AccountWithCredential> {
        self.bounded(deadline, |state| {
            state
                .active_by_email(email)
                .map(|s| AccountWithCredential {
                    account: s.account.clone(),
                    credential: s.credential.clone(),
                })
                .ok_or(IdentityError::NotFound)
        })
        .await
    }

    async fn create_and_invite(
        &self,
        account: &NewAccount,
        token_hash: &TokenHash,
        expires_at: DateTime<Utc>,
        deadline: Deadline,
    ) -> IdentityResult<Account> {
        self.bounded(deadline, |state| {
            let created = state.insert(account)?;
            state.invitations.insert(
                token_hash.clone(),
                Invitation {
                    token_hash: token_hash.clone(),
                    account_id: created.id,
                    expires_at,
                },
            );
            Ok(created)
        })
        .await
    }

    async fn activate(&self, token_hash: &TokenHash, deadline: Deadline) -> IdentityResult<i64> {
        self.bounded(deadline, |state| {
            let invitation = state
                .invitations
                .get(token_hash)
                .filter(|inv| !inv.is_expired())
                .cloned()
                .ok_or(IdentityError::NotFound)?;

            let stored = state
                .accounts
                .get_mut(&invitation.account_id)
                .ok_or(IdentityError::NotFound)?;
            stored.account.is_active = true;

            state
                .invitations
                .retain(|_, inv| inv.account_id != invitation.account_id);
            Ok(invitation.account_id)
        })
        .await
    }

    async fn delete_account(&self, id: i64, deadline: Deadline) -> IdentityResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("delete rejected".to_string()).into());
        }

        self.bounded(deadline, |state| {
            state.accounts.remove(&id).ok_or(IdentityError::NotFound)?;
            state.invitations.retain(|_, inv| inv.account_id != id);
            Ok(())
        })
        .await
    }

    async fn health_check(&self, deadline: Deadline) -> IdentityResult<()> {
        self.bounded(deadline, |_| Ok(())).await
    }
}

#[async_trait]
impl RoleStore for MemoryIdentityStore {
    async fn get_role_by_name(&self, name: &str, deadline: Deadline) -> IdentityResult<Role> {
        self.bounded(deadline, |state| {
            state
                .roles
                .iter()
                .find(|role| role.name == name)
                .cloned()
                .ok_or(IdentityError::NotFound)
        })
        .await
    }

    async fn list_roles(&self, deadline: Deadline) -> IdentityResult<Vec<Role>> {
        self.bounded(deadline, |state| {
            let mut roles = state.roles.clone();
            roles.sort_by_key(|role| role.level);
            Ok(roles)
        })
        .await
    }
}
