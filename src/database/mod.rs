//! Database Module
//!
//! Connection pool management and migrations for the identity store.

pub mod connection;

// Re-export commonly used types
pub use connection::{run_migrations, DatabaseConfig, DatabasePool};
