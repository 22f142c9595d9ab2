//! Utilities Module
//!
//! Shared utilities for error handling, security, validation, and deadlines
//! used throughout the identity service.

pub mod deadline;
pub mod error;
pub mod security;
pub mod validation;

// Re-export commonly used utilities
pub use deadline::{Deadline, QUERY_TIMEOUT};
pub use error::{AppError, AppResult, ErrorResponse, IdentityError, IdentityResult};
pub use security::*;
pub use validation::*;
