//! PostgreSQL identity store
//!
//! SQLx-backed implementation of `IdentityStore` and `RoleStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{PgConnection, PgPool};

use crate::models::account::AccountRow;
use crate::models::{Account, AccountWithCredential, NewAccount, Role, TokenHash};
use crate::store::{IdentityStore, RoleStore, StoreError, EMAIL_CONSTRAINT, USERNAME_CONSTRAINT};
use crate::utils::deadline::Deadline;
use crate::utils::error::{IdentityError, IdentityResult};

const SELECT_ACCOUNT: &str = r#"
    SELECT a.id, a.username, a.email, a.password_hash, a.created_at, a.is_active,
           r.id AS role_id, r.name AS role_name, r.description AS role_description,
           r.level AS role_level
    FROM accounts a
    JOIN roles r ON a.role_id = r.id
"#;

/// Identity store backed by a shared PostgreSQL pool
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_active_row(
        &self,
        filter: &str,
        bind: AccountFilter<'_>,
        deadline: Deadline,
    ) -> IdentityResult<AccountRow> {
        let query = format!("{} WHERE {} AND a.is_active = TRUE", SELECT_ACCOUNT, filter);

        bounded(deadline, async {
            let query = sqlx::query_as::<_, AccountRow>(&query);
            let query = match bind {
                AccountFilter::Id(id) => query.bind(id),
                AccountFilter::Email(email) => query.bind(email),
            };

            query
                .fetch_optional(&self.pool)
                .await?
                .ok_or(IdentityError::NotFound)
        })
        .await
    }
}

enum AccountFilter<'a> {
    Id(i64),
    Email(&'a str),
}

/// Run `fut` under `deadline`, surfacing expiry as a store timeout
async fn bounded<T, F>(deadline: Deadline, fut: F) -> IdentityResult<T>
where
    F: std::future::Future<Output = IdentityResult<T>>,
{
    deadline.run(fut).await.map_err(StoreError::from)?
}

/// Translate unique-constraint violations into duplicate kinds
fn map_insert_error(err: sqlx::Error) -> IdentityError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.constraint() {
            Some(EMAIL_CONSTRAINT) => return IdentityError::DuplicateEmail,
            Some(USERNAME_CONSTRAINT) => return IdentityError::DuplicateUsername,
            _ => {}
        }
    }
    IdentityError::from(err)
}

async fn insert_account(conn: &mut PgConnection, account: &NewAccount) -> IdentityResult<Account> {
    let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO accounts (username, email, password_hash, role_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, created_at
        "#,
    )
    .bind(&account.username)
    .bind(&account.email)
    .bind(account.credential.hash())
    .bind(account.role.id)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_insert_error)?;

    Ok(Account {
        id,
        username: account.username.clone(),
        email: account.email.clone(),
        created_at,
        is_active: false,
        role: account.role.clone(),
    })
}

async fn delete_invitation(conn: &mut PgConnection, account_id: i64) -> IdentityResult<()> {
    sqlx::query("DELETE FROM user_invitations WHERE user_id = $1")
        .bind(account_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn create_account(
        &self,
        account: &NewAccount,
        deadline: Deadline,
    ) -> IdentityResult<Account> {
        bounded(deadline, async {
            let mut conn = self.pool.acquire().await?;
            insert_account(&mut conn, account).await
        })
        .await
    }

    async fn get_by_id(&self, id: i64, deadline: Deadline) -> IdentityResult<Account> {
        self.fetch_active_row("a.id = $1", AccountFilter::Id(id), deadline)
            .await
            .map(Account::from)
    }

    async fn get_by_email(&self, email: &str, deadline: Deadline) -> IdentityResult<Account> {
        self.fetch_active_row("a.email = $1", AccountFilter::Email(email), deadline)
            .await
            .map(Account::from)
    }

    async fn get_credentials_by_email(
        &self,
        email: &str,
        deadline: Deadline,
    ) -> IdentityResult<AccountWithCredential> {
        self.fetch_active_row("a.email = $1", AccountFilter::Email(email), deadline)
            .await
            .map(AccountWithCredential::from)
    }

    async fn create_and_invite(
        &self,
        account: &NewAccount,
        token_hash: &TokenHash,
        expires_at: DateTime<Utc>,
        deadline: Deadline,
    ) -> IdentityResult<Account> {
        bounded(deadline, async {
            let mut tx = self.pool.begin().await?;

            let created = insert_account(&mut tx, account).await?;

            sqlx::query(
                r#"
                INSERT INTO user_invitations (token_hash, user_id, expiry)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(token_hash.as_str())
            .bind(created.id)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(created)
        })
        .await
    }

    async fn activate(&self, token_hash: &TokenHash, deadline: Deadline) -> IdentityResult<i64> {
        bounded(deadline, async {
            let mut tx = self.pool.begin().await?;

            // Locks the invitation so a concurrent redemption of the same
            // token waits and then finds nothing.
            let account_id: i64 = sqlx::query_scalar(
                r#"
                SELECT ui.user_id
                FROM user_invitations ui
                JOIN accounts a ON a.id = ui.user_id
                WHERE ui.token_hash = $1 AND ui.expiry > NOW()
                FOR UPDATE OF ui
                "#,
            )
            .bind(token_hash.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(IdentityError::NotFound)?;

            sqlx::query("UPDATE accounts SET is_active = TRUE WHERE id = $1")
                .bind(account_id)
                .execute(&mut *tx)
                .await?;

            delete_invitation(&mut tx, account_id).await?;

            tx.commit().await?;
            debug!("activated account_id={}", account_id);
            Ok(account_id)
        })
        .await
    }

    async fn delete_account(&self, id: i64, deadline: Deadline) -> IdentityResult<()> {
        bounded(deadline, async {
            let mut tx = self.pool.begin().await?;

            delete_invitation(&mut tx, id).await?;

            let deleted = sqlx::query("DELETE FROM accounts WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if deleted == 0 {
                return Err(IdentityError::NotFound);
            }

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn health_check(&self, deadline: Deadline) -> IdentityResult<()> {
        bounded(deadline, async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RoleStore for PgIdentityStore {
    async fn get_role_by_name(&self, name: &str, deadline: Deadline) -> IdentityResult<Role> {
        bounded(deadline, async {
            sqlx::query_as::<_, Role>(
                "SELECT id, name, description, level FROM roles WHERE name = $1",
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(IdentityError::NotFound)
        })
        .await
    }

    async fn list_roles(&self, deadline: Deadline) -> IdentityResult<Vec<Role>> {
        bounded(deadline, async {
            let roles = sqlx::query_as::<_, Role>(
                "SELECT id, name, description, level FROM roles ORDER BY level",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(roles)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    //! These run against a real database; set DATABASE_URL and pass
    //! `--ignored` to include them.

    use super::*;
    use crate::models::{Credential, InvitationToken};
    use crate::models::role::default_roles;
    use chrono::Duration;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            credential: Credential::from_secret("hunter2", 4).unwrap(),
            role: default_roles().remove(0),
        }
    }

    async fn invitation_count(pool: &PgPool, account_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_invitations WHERE user_id = $1")
            .bind(account_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_create_and_activate(pool: PgPool) {
        let store = PgIdentityStore::new(pool.clone());
        let token = InvitationToken::generate();
        let expires_at = Utc::now() + Duration::days(3);

        let account = store
            .create_and_invite(&new_account("alice", "a@example.com"), &token.hash(), expires_at, Deadline::query())
            .await
            .unwrap();
        assert!(!account.is_active);
        assert!(matches!(
            store.get_by_id(account.id, Deadline::query()).await,
            Err(IdentityError::NotFound)
        ));

        store.activate(&token.hash(), Deadline::query()).await.unwrap();

        let active = store.get_by_email("a@example.com", Deadline::query()).await.unwrap();
        assert!(active.is_active);
        assert_eq!(active.role.name, "user");
        assert_eq!(invitation_count(&pool, account.id).await, 0);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_duplicate_constraints(pool: PgPool) {
        let store = PgIdentityStore::new(pool);
        store
            .create_account(&new_account("alice", "a@example.com"), Deadline::query())
            .await
            .unwrap();

        let dup_email = store
            .create_account(&new_account("bob", "a@example.com"), Deadline::query())
            .await;
        assert!(matches!(dup_email, Err(IdentityError::DuplicateEmail)));

        let dup_username = store
            .create_account(&new_account("alice", "b@example.com"), Deadline::query())
            .await;
        assert!(matches!(dup_username, Err(IdentityError::DuplicateUsername)));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_expired_invitation_not_redeemable(pool: PgPool) {
        let store = PgIdentityStore::new(pool.clone());
        let token = InvitationToken::generate();
        let account = store
            .create_and_invite(
                &new_account("alice", "a@example.com"),
                &token.hash(),
                Utc::now() - Duration::minutes(1),
                Deadline::query(),
            )
            .await
            .unwrap();

        let result = store.activate(&token.hash(), Deadline::query()).await;
        assert!(matches!(result, Err(IdentityError::NotFound)));
        assert_eq!(invitation_count(&pool, account.id).await, 1);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_delete_removes_pending_invitation(pool: PgPool) {
        let store = PgIdentityStore::new(pool.clone());
        let token = InvitationToken::generate();
        let account = store
            .create_and_invite(
                &new_account("alice", "a@example.com"),
                &token.hash(),
                Utc::now() + Duration::days(1),
                Deadline::query(),
            )
            .await
            .unwrap();

        store.delete_account(account.id, Deadline::query()).await.unwrap();

        assert_eq!(invitation_count(&pool, account.id).await, 0);
        assert!(matches!(
            store.delete_account(account.id, Deadline::query()).await,
            Err(IdentityError::NotFound)
        ));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_seeded_roles(pool: PgPool) {
        let store = PgIdentityStore::new(pool);
        let roles = store.list_roles(Deadline::query()).await.unwrap();
        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["user", "moderator", "admin"]);

        let admin = store.get_role_by_name("admin", Deadline::query()).await.unwrap();
        assert_eq!(admin.level, 3);
    }
}
