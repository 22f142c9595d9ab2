//! In-process identity cache with TTL expiry

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::cache::{CacheError, IdentityCache, USER_TTL};
use crate::models::Account;
use crate::utils::deadline::Deadline;

/// `IdentityCache` over a process-local map
///
/// Expiry follows the tokio clock so tests can advance paused time.
pub struct MemoryIdentityCache {
    entries: Mutex<HashMap<i64, (Account, Instant)>>,
    ttl: Duration,
    unavailable: AtomicBool,
    hits: AtomicUsize,
}

impl Default for MemoryIdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityCache {
    pub fn new() -> Self {
        Self::with_ttl(USER_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            unavailable: AtomicBool::new(false),
            hits: AtomicUsize::new(0),
        }
    }

    /// Simulate a transport outage
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of lookups answered from the cache
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn check_available(&self, deadline: Deadline) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("cache offline".to_string()));
        }
        if deadline.is_elapsed() {
            return Err(CacheError::Timeout(Duration::ZERO));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityCache for MemoryIdentityCache {
    async fn get(&self, account_id: i64, deadline: Deadline) -> Result<Option<Account>, CacheError> {
        self.check_available(deadline)?;

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))?;

        match entries.get(&account_id) {
            Some((account, expires_at)) if Instant::now() < *expires_at => {
                self.hits.fetch_add(1, Ordering::SeqCst);
                Ok(Some(account.clone()))
            }
            Some(_) => {
                entries.remove(&account_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, account: &Account, deadline: Deadline) -> Result<(), CacheError> {
        self.check_available(deadline)?;

        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))?
            .insert(account.id, (account.clone(), Instant::now() + self.ttl));
        Ok(())
    }

    async fn delete(&self, account_id: i64, deadline: Deadline) -> Result<(), CacheError> {
        self.check_available(deadline)?;

        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))?
            .remove(&account_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::default_roles;
    use chrono::Utc;

    fn account(id: i64) -> Account {
        Account {
            id,
            username: "alice".to_string(),
            email: "a@example.com".to_string(),
            created_at: Utc::now(),
            is_active: true,
            role: default_roles().remove(0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_served_until_ttl() {
        let cache = MemoryIdentityCache::new();
        let snapshot = account(1);
        cache.set(&snapshot, Deadline::query()).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(1, Deadline::query()).await.unwrap(), Some(snapshot));
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_expires_after_ttl() {
        let cache = MemoryIdentityCache::new();
        cache.set(&account(1), Deadline::query()).await.unwrap();

        tokio::time::advance(USER_TTL + Duration::from_secs(1)).await;
        assert_eq!(cache.get(1, Deadline::query()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_miss_is_not_an_error() {
        let cache = MemoryIdentityCache::new();
        assert_eq!(cache.get(99, Deadline::query()).await.unwrap(), None);
        assert_eq!(cache.hits(), 0);
    }

    #[tokio::test]
    async fn test_delete_drops_snapshot() {
        let cache = MemoryIdentityCache::new();
        cache.set(&account(1), Deadline::query()).await.unwrap();
        cache.set(&account(2), Deadline::query()).await.unwrap();

        cache.delete(1, Deadline::query()).await.unwrap();
        assert_eq!(cache.get(1, Deadline::query()).await.unwrap(), None);
        assert!(cache.get(2, Deadline::query()).await.unwrap().is_some());

        // Deleting a missing key is fine
        cache.delete(1, Deadline::query()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_cache_errors() {
        let cache = MemoryIdentityCache::new();
        cache.set_unavailable(true);
        assert!(matches!(
            cache.get(1, Deadline::query()).await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(matches!(
            cache.delete(1, Deadline::query()).await,
            Err(CacheError::Unavailable(_))
        ));
    }
}
