//! Social Identity Library
//!
//! Account registration with emailed invitation tokens, invitation
//! activation, bearer-token authentication, and role-based authorization for
//! a social platform. Persistence sits behind the `IdentityStore` trait with
//! PostgreSQL and in-memory backends, and identity lookups can be served from
//! a Redis read-through cache.
//!
//! # Features
//!
//! - **Registration Saga**: account creation and invitation delivery with
//!   reverse-order compensation when a step fails
//! - **Invitation Tokens**: single-use, time-limited, stored only as SHA-256 digests
//! - **Bearer Tokens**: HS256 tokens with issuer, audience, and expiry checks
//! - **Role Hierarchy**: level-based authorization with an ownership bypass
//! - **Deadlines**: every store and cache call runs under an explicit timeout
//! - **Flexible Router**: configurable endpoints via the RouterBuilder pattern
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use social_identity::{
//!     api::{AppState, RouterBuilder},
//!     config::AppConfig,
//!     models::RoleHierarchy,
//!     service::{AccessResolver, AuthenticationService, RegistrationService, SmtpMailer, TokenCodec},
//!     store::{PgIdentityStore, RoleStore},
//!     utils::Deadline,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let pool = config.database.create_pool().await?;
//!     let store = Arc::new(PgIdentityStore::new(pool));
//!
//!     let hierarchy = Arc::new(RoleHierarchy::from_roles(
//!         store.list_roles(Deadline::query()).await?,
//!     )?);
//!     let codec = TokenCodec::new(&config.auth);
//!     let mailer = Arc::new(SmtpMailer::log_only("Social Identity")?);
//!     let access = Arc::new(AccessResolver::new(
//!         store.clone(),
//!         None,
//!         codec.clone(),
//!         hierarchy.clone(),
//!     ));
//!
//!     let state = AppState {
//!         store: store.clone(),
//!         registration: Arc::new(RegistrationService::new(
//!             store.clone(),
//!             mailer,
//!             hierarchy,
//!             config.server.clone(),
//!             config.invitation.clone(),
//!         )),
//!         authentication: Arc::new(AuthenticationService::new(store, codec)),
//!         access: access.clone(),
//!     };
//!
//!     let app = RouterBuilder::with_all_routes()
//!         .with_auth(access)
//!         .build()
//!         .with_state(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **API Layer**: HTTP handlers, bearer middleware, and route definitions
//! - **Service Layer**: registration saga, authentication, access resolution, mail
//! - **Store / Cache**: persistence and read-through snapshot traits with
//!   live and in-memory implementations
//! - **Models**: accounts, roles, credentials, invitation tokens, claims
//! - **Utils**: errors, deadlines, validation, and security helpers

/// HTTP API layer with handlers and configurable routing
pub mod api;

/// Read-through identity cache
pub mod cache;

/// Configuration management for all service settings
pub mod config;

/// Database connection management and migrations
pub mod database;

/// Data models and request/response structures
pub mod models;

/// Registration, authentication, and authorization services
pub mod service;

/// Account, invitation, and role persistence
pub mod store;

/// Shared utilities for errors, deadlines, security, and validation
pub mod utils;

// Re-export commonly used types for convenient access
pub use api::{create_routes, AppState, RouterBuilder};
pub use cache::{IdentityCache, MemoryIdentityCache, RedisIdentityCache};
pub use config::{AppConfig, AuthConfig, ConfigError, InvitationConfig, ServerConfig};
pub use database::{DatabaseConfig, DatabasePool};
pub use models::{
    Account, BearerClaims, CreateTokenRequest, Credential, InvitationToken, IssuedToken,
    RegisterAccountRequest, Role, RoleHierarchy,
};
pub use service::{
    AccessResolver, AuthenticationService, Mailer, RegistrationService, SmtpMailer, StaticMailer,
    TokenCodec,
};
pub use store::{IdentityStore, MemoryIdentityStore, PgIdentityStore, RoleStore};
pub use utils::error::{AppError, AppResult, ErrorResponse, IdentityError, IdentityResult};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
