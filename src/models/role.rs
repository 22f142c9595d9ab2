//! Role Model
//!
//! Roles and the immutable role hierarchy loaded once at startup.

use serde::{Deserialize, Serialize};

use crate::utils::error::{IdentityError, IdentityResult};

/// Authorization role; `level` is the only authorization signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,

    /// Unique human-readable name ("user", "moderator", "admin")
    pub name: String,

    pub description: String,

    /// Higher is more privileged
    pub level: i32,
}

/// Read-only snapshot of the `roles` table, ordered by ascending level
#[derive(Debug, Clone)]
pub struct RoleHierarchy {
    roles: Vec<Role>,
}

impl RoleHierarchy {
    /// Build a hierarchy; at least one role is required
    pub fn from_roles(mut roles: Vec<Role>) -> IdentityResult<Self> {
        if roles.is_empty() {
            return Err(IdentityError::NotFound);
        }
        roles.sort_by_key(|role| role.level);
        Ok(Self { roles })
    }

    /// The lowest-privilege role, assigned to new accounts
    pub fn lowest(&self) -> &Role {
        &self.roles[0]
    }

    pub fn get(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|role| role.name == name)
    }

    /// Level of the named role, `NotFound` if no such role exists
    pub fn level_of(&self, name: &str) -> IdentityResult<i32> {
        self.get(name)
            .map(|role| role.level)
            .ok_or(IdentityError::NotFound)
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

/// Roles seeded by the initial migration
pub fn default_roles() -> Vec<Role> {
    vec![
        Role {
            id: 1,
            name: "user".to_string(),
            description: "A user can create posts and comments".to_string(),
            level: 1,
        },
        Role {
            id: 2,
            name: "moderator".to_string(),
            description: "A moderator can update other users posts".to_string(),
            level: 2,
        },
        Role {
            id: 3,
            name: "admin".to_string(),
            description: "An admin can update and delete other users posts".to_string(),
            level: 3,
        },
    ]
}
