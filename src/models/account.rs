//! Account Model
//!
//! Accounts and the row shapes used to load them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::credential::Credential;
use crate::models::role::Role;

/// Account representation returned by identity lookups and cached snapshots
///
/// Never carries the credential hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned identifier
    pub id: i64,

    pub username: String,

    pub email: String,

    /// Timestamp when the account was created
    pub created_at: DateTime<Utc>,

    /// False until the invitation token is redeemed
    pub is_active: bool,

    /// Resolved role
    pub role: Role,
}

/// Account to be inserted; the store assigns id and creation time
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub credential: Credential,
    pub role: Role,
}

/// Internal account representation including the credential
///
/// Only used on the authentication path; never serialized.
#[derive(Debug, Clone)]
pub struct AccountWithCredential {
    pub account: Account,
    pub credential: Credential,
}

/// Flat `accounts JOIN roles` row
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AccountRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub role_id: i64,
    pub role_name: String,
    pub role_description: String,
    pub role_level: i32,
}

impl From<AccountRow> for AccountWithCredential {
    fn from(row: AccountRow) -> Self {
        AccountWithCredential {
            credential: Credential::from_hash(row.password_hash),
            account: Account {
                id: row.id,
                username: row.username,
                email: row.email,
                created_at: row.created_at,
                is_active: row.is_active,
                role: Role {
                    id: row.role_id,
                    name: row.role_name,
                    description: row.role_description,
                    level: row.role_level,
                },
            },
        }
    }
}

impl From<AccountRow> for Account {
    /// Strips the password hash
    fn from(row: AccountRow) -> Self {
        AccountWithCredential::from(row).account
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> AccountRow {
        AccountRow {
            id: 7,
            username: "alice".to_string(),
            email: "a@example.com".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            created_at: Utc::now(),
            is_active: true,
            role_id: 1,
            role_name: "user".to_string(),
            role_description: "regular user".to_string(),
            role_level: 1,
        }
    }

    #[test]
    fn test_row_conversion_resolves_role() {
        let account: Account = row().into();

        assert_eq!(account.id, 7);
        assert_eq!(account.username, "alice");
        assert_eq!(account.role.name, "user");
        assert_eq!(account.role.level, 1);
    }

    #[test]
    fn test_row_conversion_keeps_credential_internal() {
        let with_credential: AccountWithCredential = row().into();
        assert_eq!(with_credential.credential.hash(), "$2b$04$hash");

        let json = serde_json::to_string(&with_credential.account).unwrap();
        assert!(!json.contains("hash"));
    }

    #[test]
    fn test_account_json_round_trip() {
        let account: Account = row().into();
        let json = serde_json::to_string(&account).unwrap();
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(account, back);
    }
}
