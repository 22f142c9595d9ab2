//! Identity Cache
//!
//! Short-lived snapshots of accounts keyed by id. A miss is not an error;
//! callers fall back to the store and write the result back.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Account;
use crate::utils::deadline::{Deadline, Elapsed};

pub mod memory;
pub mod redis;

pub use self::memory::MemoryIdentityCache;
pub use self::redis::RedisIdentityCache;

/// Lifetime of a cached account snapshot
pub const USER_TTL: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache transport error: {0}")]
    Transport(#[from] ::redis::RedisError),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl From<Elapsed> for CacheError {
    fn from(elapsed: Elapsed) -> Self {
        CacheError::Timeout(elapsed.budget)
    }
}

/// Key under which an account snapshot is stored
pub fn cache_key(account_id: i64) -> String {
    format!("user-{}", account_id)
}

#[async_trait]
pub trait IdentityCache: Send + Sync {
    /// Cached snapshot, `None` on a miss or after expiry
    async fn get(&self, account_id: i64, deadline: Deadline) -> Result<Option<Account>, CacheError>;

    /// Store a snapshot that expires after `USER_TTL`
    async fn set(&self, account: &Account, deadline: Deadline) -> Result<(), CacheError>;

    /// Drop the snapshot for `account_id`; absent keys are not an error
    async fn delete(&self, account_id: i64, deadline: Deadline) -> Result<(), CacheError>;
}
