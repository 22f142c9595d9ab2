//! Data Models Module
//!
//! Accounts, roles, credentials, invitation tokens, bearer claims, and the
//! request/response payloads of the HTTP surface.

pub mod account;
pub mod auth;
pub mod credential;
pub mod invitation;
pub mod requests;
pub mod role;

// Re-export commonly used types
pub use account::{Account, AccountWithCredential, NewAccount};
pub use auth::{BearerClaims, IssuedToken};
pub use credential::{Credential, CredentialError};
pub use invitation::{Invitation, InvitationToken, TokenHash};
pub use requests::*;
pub use role::{Role, RoleHierarchy};
