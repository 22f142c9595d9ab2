//! Access Resolver
//!
//! Answers "who is making this request" and "may they act at this role
//! level". Identity lookups read through the optional cache; a cache
//! transport failure fails the lookup rather than falling back to the store.

use std::sync::Arc;

use log::{debug, warn};

use crate::cache::IdentityCache;
use crate::models::{Account, RoleHierarchy};
use crate::service::token::TokenCodec;
use crate::store::IdentityStore;
use crate::utils::deadline::Deadline;
use crate::utils::error::{IdentityError, IdentityResult};

const BEARER_PREFIX: &str = "Bearer ";

pub struct AccessResolver {
    store: Arc<dyn IdentityStore>,
    cache: Option<Arc<dyn IdentityCache>>,
    codec: TokenCodec,
    hierarchy: Arc<RoleHierarchy>,
}

impl AccessResolver {
    /// `cache` of `None` disables caching; every lookup goes to the store
    pub fn new(
        store: Arc<dyn IdentityStore>,
        cache: Option<Arc<dyn IdentityCache>>,
        codec: TokenCodec,
        hierarchy: Arc<RoleHierarchy>,
    ) -> Self {
        Self {
            store,
            cache,
            codec,
            hierarchy,
        }
    }

    /// Activated account for `account_id`
    pub async fn resolve_identity(&self, account_id: i64) -> IdentityResult<Account> {
        let Some(cache) = &self.cache else {
            return self.store.get_by_id(account_id, Deadline::query()).await;
        };

        match cache.get(account_id, Deadline::query()).await {
            Ok(Some(account)) => return Ok(account),
            Ok(None) => debug!("identity cache miss account_id={}", account_id),
            Err(e) => {
                warn!("identity cache read failed account_id={}: {}", account_id, e);
                return Err(e.into());
            }
        }

        let account = self.store.get_by_id(account_id, Deadline::query()).await?;

        if let Err(e) = cache.set(&account, Deadline::query()).await {
            warn!("identity cache write failed account_id={}: {}", account_id, e);
            return Err(e.into());
        }

        Ok(account)
    }

    /// Evict the cached snapshot of a deleted account
    ///
    /// A failed eviction is returned so callers never report success while a
    /// stale identity can still be served.
    pub async fn forget_identity(&self, account_id: i64) -> IdentityResult<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        if let Err(e) = cache.delete(account_id, Deadline::query()).await {
            warn!("identity cache eviction failed account_id={}: {}", account_id, e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Resolve the identity behind an `Authorization` header value
    pub async fn resolve_bearer(&self, header: Option<&str>) -> IdentityResult<Account> {
        let header = header.ok_or_else(|| unauthorized("authorization header is missing"))?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthorized("authorization header is malformed"))?;

        self.resolve_bearer_token(token).await
    }

    /// Validate a raw bearer token and resolve its subject
    ///
    /// Every failure collapses into `Unauthorized`.
    pub async fn resolve_bearer_token(&self, token: &str) -> IdentityResult<Account> {
        let claims = self.codec.validate(token).map_err(|e| {
            debug!("rejected bearer token: {}", e);
            unauthorized("invalid token")
        })?;

        self.resolve_identity(claims.sub).await.map_err(|e| {
            debug!("bearer subject {} not resolvable: {}", claims.sub, e);
            unauthorized("unknown subject")
        })
    }

    /// Grant iff `actor` owns the resource or its role level is at least
    /// that of `required_role`
    pub fn authorize(
        &self,
        actor: &Account,
        required_role: &str,
        resource_owner: Option<i64>,
    ) -> IdentityResult<()> {
        if resource_owner == Some(actor.id) {
            return Ok(());
        }

        let required = self.hierarchy.level_of(required_role).map_err(|_| {
            warn!("authorization against unknown role {}", required_role);
            IdentityError::Forbidden
        })?;

        if actor.role.level >= required {
            Ok(())
        } else {
            Err(IdentityError::Forbidden)
        }
    }
}

fn unauthorized(reason: &str) -> IdentityError {
    IdentityError::Unauthorized(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryIdentityCache};
    use crate::config::AuthConfig;
    use crate::models::role::default_roles;
    use crate::models::{BearerClaims, Credential, NewAccount, Role};
    use crate::store::MemoryIdentityStore;
    use chrono::{Duration, Utc};

    fn codec() -> TokenCodec {
        TokenCodec::new(&AuthConfig {
            secret: "secret".to_string(),
            token_expires_hours: 1,
            issuer: "social-identity".to_string(),
            audience: "social-identity".to_string(),
        })
    }

    fn hierarchy() -> Arc<RoleHierarchy> {
        Arc::new(RoleHierarchy::from_roles(default_roles()).unwrap())
    }

    fn role(name: &str) -> Role {
        hierarchy().get(name).unwrap().clone()
    }

    fn seed(store: &MemoryIdentityStore, username: &str, role_name: &str) -> Account {
        store
            .insert_active(&NewAccount {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                credential: Credential::from_hash("$2b$04$placeholder"),
                role: role(role_name),
            })
            .unwrap()
    }

    fn resolver(
        store: &Arc<MemoryIdentityStore>,
        cache: Option<Arc<MemoryIdentityCache>>,
    ) -> AccessResolver {
        AccessResolver::new(
            store.clone(),
            cache.map(|c| c as Arc<dyn IdentityCache>),
            codec(),
            hierarchy(),
        )
    }

    #[tokio::test]
    async fn test_resolve_without_cache() {
        let store = Arc::new(MemoryIdentityStore::new());
        let alice = seed(&store, "alice", "user");

        let resolved = resolver(&store, None).resolve_identity(alice.id).await.unwrap();
        assert_eq!(resolved, alice);
    }

    #[tokio::test]
    async fn test_read_through_populates_cache() {
        let store = Arc::new(MemoryIdentityStore::new());
        let cache = Arc::new(MemoryIdentityCache::new());
        let alice = seed(&store, "alice", "user");
        let resolver = resolver(&store, Some(cache.clone()));

        resolver.resolve_identity(alice.id).await.unwrap();
        assert_eq!(cache.hits(), 0);

        let second = resolver.resolve_identity(alice.id).await.unwrap();
        assert_eq!(second, alice);
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test]
    async fn test_cache_outage_fails_closed() {
        let store = Arc::new(MemoryIdentityStore::new());
        let cache = Arc::new(MemoryIdentityCache::new());
        let alice = seed(&store, "alice", "user");
        cache.set_unavailable(true);

        let result = resolver(&store, Some(cache)).resolve_identity(alice.id).await;
        assert!(matches!(
            result,
            Err(IdentityError::Cache(CacheError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_deleted_account_not_served_from_cache() {
        let store = Arc::new(MemoryIdentityStore::new());
        let cache = Arc::new(MemoryIdentityCache::new());
        let alice = seed(&store, "alice", "user");
        let resolver = resolver(&store, Some(cache.clone()));
        let token = codec().issue(alice.id).unwrap().token;

        resolver.resolve_bearer_token(&token).await.unwrap();
        store.delete_account(alice.id, Deadline::query()).await.unwrap();
        resolver.forget_identity(alice.id).await.unwrap();

        assert!(matches!(
            resolver.resolve_bearer_token(&token).await,
            Err(IdentityError::Unauthorized(_))
        ));
        assert_eq!(cache.hits(), 0);
    }

    #[tokio::test]
    async fn test_failed_eviction_is_reported() {
        let store = Arc::new(MemoryIdentityStore::new());
        let cache = Arc::new(MemoryIdentityCache::new());
        cache.set_unavailable(true);

        assert!(matches!(
            resolver(&store, Some(cache)).forget_identity(7).await,
            Err(IdentityError::Cache(CacheError::Unavailable(_)))
        ));
        assert!(resolver(&store, None).forget_identity(7).await.is_ok());
    }

    #[tokio::test]
    async fn test_inactive_account_not_resolved() {
        let store = Arc::new(MemoryIdentityStore::new());
        let pending = store
            .create_account(
                &NewAccount {
                    username: "pending".to_string(),
                    email: "p@example.com".to_string(),
                    credential: Credential::from_hash("$2b$04$placeholder"),
                    role: role("user"),
                },
                Deadline::query(),
            )
            .await
            .unwrap();

        let result = resolver(&store, None).resolve_identity(pending.id).await;
        assert!(matches!(result, Err(IdentityError::NotFound)));
    }

    #[tokio::test]
    async fn test_resolve_bearer() {
        let store = Arc::new(MemoryIdentityStore::new());
        let alice = seed(&store, "alice", "user");
        let resolver = resolver(&store, None);
        let token = codec().issue(alice.id).unwrap().token;

        let header = format!("Bearer {}", token);
        let resolved = resolver.resolve_bearer(Some(&header)).await.unwrap();
        assert_eq!(resolved.id, alice.id);
    }

    #[tokio::test]
    async fn test_bearer_failures_are_unauthorized() {
        let store = Arc::new(MemoryIdentityStore::new());
        let resolver = resolver(&store, None);
        let unknown_subject = codec().issue(999).unwrap().token;
        let expired = codec()
            .generate(&BearerClaims::new(
                1,
                Utc::now() - Duration::hours(3),
                Duration::hours(1),
                "social-identity",
                "social-identity",
            ))
            .unwrap();

        let headers = [
            None,
            Some("Basic dXNlcjpwYXNz".to_string()),
            Some("Bearer ".to_string()),
            Some("Bearer garbage".to_string()),
            Some(format!("Bearer {}", expired)),
            Some(format!("Bearer {}", unknown_subject)),
        ];

        for header in headers {
            let result = resolver.resolve_bearer(header.as_deref()).await;
            assert!(
                matches!(result, Err(IdentityError::Unauthorized(_))),
                "header {:?} should be unauthorized",
                header
            );
        }
    }

    #[tokio::test]
    async fn test_bearer_cache_outage_is_unauthorized() {
        let store = Arc::new(MemoryIdentityStore::new());
        let cache = Arc::new(MemoryIdentityCache::new());
        let alice = seed(&store, "alice", "user");
        cache.set_unavailable(true);
        let token = codec().issue(alice.id).unwrap().token;

        let result = resolver(&store, Some(cache)).resolve_bearer_token(&token).await;
        assert!(matches!(result, Err(IdentityError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_role_precedence() {
        let store = Arc::new(MemoryIdentityStore::new());
        let resolver = resolver(&store, None);
        let user = seed(&store, "alice", "user");
        let moderator = seed(&store, "mod", "moderator");
        let admin = seed(&store, "root", "admin");

        assert!(matches!(
            resolver.authorize(&user, "moderator", None),
            Err(IdentityError::Forbidden)
        ));
        assert!(resolver.authorize(&moderator, "moderator", None).is_ok());
        assert!(resolver.authorize(&admin, "moderator", None).is_ok());
        assert!(resolver.authorize(&moderator, "admin", Some(user.id)).is_err());
    }

    #[tokio::test]
    async fn test_owner_bypasses_role_check() {
        let store = Arc::new(MemoryIdentityStore::new());
        let resolver = resolver(&store, None);
        let user = seed(&store, "alice", "user");

        assert!(resolver.authorize(&user, "admin", Some(user.id)).is_ok());
        assert!(resolver.authorize(&user, "no-such-role", Some(user.id)).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_required_role_denied() {
        let store = Arc::new(MemoryIdentityStore::new());
        let resolver = resolver(&store, None);
        let admin = seed(&store, "root", "admin");

        assert!(matches!(
            resolver.authorize(&admin, "no-such-role", None),
            Err(IdentityError::Forbidden)
        ));
    }
}
