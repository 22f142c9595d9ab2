//! Service Layer
//!
//! Registration, authentication, and access resolution on top of the
//! identity store, cache, token codec, and mail collaborator.

pub mod access;
pub mod auth;
pub mod mail;
pub mod registration;
pub mod saga;
pub mod token;

// Re-export services
pub use access::AccessResolver;
pub use auth::AuthenticationService;
pub use mail::{Mailer, SmtpMailer, StaticMailer};
pub use registration::RegistrationService;
pub use token::TokenCodec;
