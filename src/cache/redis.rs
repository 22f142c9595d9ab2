//! Redis-backed identity cache

use async_trait::async_trait;
use log::debug;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::cache::{cache_key, CacheError, IdentityCache, USER_TTL};
use crate::models::Account;
use crate::utils::deadline::Deadline;

/// Account snapshots stored as JSON strings with a per-key TTL
#[derive(Clone)]
pub struct RedisIdentityCache {
    conn: ConnectionManager,
}

impl RedisIdentityCache {
    /// Connect to the Redis instance at `url`
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl IdentityCache for RedisIdentityCache {
    async fn get(&self, account_id: i64, deadline: Deadline) -> Result<Option<Account>, CacheError> {
        let mut conn = self.conn.clone();
        let key = cache_key(account_id);

        let raw: Option<String> = deadline.run(conn.get(&key)).await??;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => {
                debug!("cache miss key={}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, account: &Account, deadline: Deadline) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(account)?;

        let _: () = deadline
            .run(conn.set_ex(cache_key(account.id), json, USER_TTL.as_secs()))
            .await??;
        Ok(())
    }

    async fn delete(&self, account_id: i64, deadline: Deadline) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();

        let removed: i64 = deadline.run(conn.del(cache_key(account_id))).await??;
        debug!("cache delete account_id={} removed={}", account_id, removed);
        Ok(())
    }
}
