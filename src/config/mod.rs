//! Configuration Module
//!
//! Immutable application configuration loaded once from the environment and
//! passed explicitly to the components that need it.

use chrono::Duration;
use thiserror::Error;

use crate::database::DatabaseConfig;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Longest accepted bearer token lifetime (one year)
pub const MAX_TOKEN_EXPIRES_HOURS: i64 = 24 * 365;

/// Longest accepted invitation lifetime (30 days)
pub const MAX_INVITATION_EXPIRES_HOURS: i64 = 24 * 30;

/// Environment variable helpers
pub mod env {
    use std::env;

    use super::ConfigError;

    /// Get environment variable as string with default
    pub fn get_string(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get environment variable as boolean with default
    pub fn get_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u32 with default
    pub fn get_u32(key: &str, default: u32) -> u32 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u16 with default
    pub fn get_u16(key: &str, default: u16) -> u16 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u64 with default
    pub fn get_u64(key: &str, default: u64) -> u64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as i64 with default
    pub fn get_i64(key: &str, default: i64) -> i64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Check if environment variable is set
    pub fn is_set(key: &str) -> bool {
        env::var(key).is_ok()
    }

    /// Get required environment variable
    pub fn get_required(key: &str) -> Result<String, ConfigError> {
        env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
    }
}

/// Application configuration combining all sections
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub invitation: InvitationConfig,
    pub cache: CacheConfig,

    /// Absent when no SMTP relay is configured
    pub mail: Option<MailConfig>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// "production" disables mail sandbox mode
    pub environment: String,

    /// Base URL activation links point at
    pub frontend_url: String,
}

/// Bearer token signing configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub token_expires_hours: i64,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct InvitationConfig {
    pub expires_hours: i64,
}

/// Identity cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub url: String,
}

/// SMTP relay configuration
#[derive(Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_name: String,
    pub from_email: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::get_string("SERVER_HOST", "0.0.0.0"),
            port: env::get_u16("SERVER_PORT", 3000),
            environment: env::get_string("APP_ENV", "development"),
            frontend_url: env::get_string("FRONTEND_URL", "http://localhost:5173"),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Activation link embedded in invitation messages
    pub fn activation_url(&self, token: &str) -> String {
        format!("{}/confirm/{}", self.frontend_url.trim_end_matches('/'), token)
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let issuer = env::get_string("AUTH_TOKEN_ISSUER", "social-identity");
        Ok(Self {
            secret: env::get_required("AUTH_TOKEN_SECRET")?,
            token_expires_hours: env::get_i64("AUTH_TOKEN_EXP_HOURS", 72),
            audience: env::get_string("AUTH_TOKEN_AUDIENCE", &issuer),
            issuer,
        })
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::hours(
            self.token_expires_hours
                .clamp(-MAX_TOKEN_EXPIRES_HOURS, MAX_TOKEN_EXPIRES_HOURS),
        )
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("token_expires_hours", &self.token_expires_hours)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl InvitationConfig {
    pub fn from_env() -> Self {
        Self {
            expires_hours: env::get_i64("INVITATION_EXP_HOURS", 72),
        }
    }

    pub fn lifetime(&self) -> Duration {
        Duration::hours(
            self.expires_hours
                .clamp(-MAX_INVITATION_EXPIRES_HOURS, MAX_INVITATION_EXPIRES_HOURS),
        )
    }
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self { expires_hours: 72 }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env::get_bool("REDIS_ENABLED", false),
            url: env::get_string("REDIS_URL", "redis://127.0.0.1:6379"),
        }
    }
}

impl MailConfig {
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        if !env::is_set("SMTP_HOST") {
            return Ok(None);
        }

        Ok(Some(Self {
            smtp_host: env::get_required("SMTP_HOST")?,
            smtp_port: env::get_u16("SMTP_PORT", 587),
            smtp_username: env::get_required("SMTP_USERNAME")?,
            smtp_password: env::get_required("SMTP_PASSWORD")?,
            from_name: env::get_string("SMTP_FROM_NAME", "Social Identity"),
            from_email: env::get_required("SMTP_FROM_EMAIL")?,
        }))
    }
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("from_email", &self.from_email)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load complete application configuration from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env(),
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            invitation: InvitationConfig::from_env(),
            cache: CacheConfig::from_env(),
            mail: MailConfig::from_env()?,
        })
    }

    /// Validate the complete configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::ValidationError(
                "Database min_connections cannot be greater than max_connections".to_string(),
            ));
        }

        if self.auth.secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Token signing secret cannot be empty".to_string(),
            ));
        }

        if !(1..=MAX_TOKEN_EXPIRES_HOURS).contains(&self.auth.token_expires_hours) {
            return Err(ConfigError::InvalidValue {
                key: "AUTH_TOKEN_EXP_HOURS".to_string(),
                reason: format!("must be between 1 and {}", MAX_TOKEN_EXPIRES_HOURS),
            });
        }

        if !(1..=MAX_INVITATION_EXPIRES_HOURS).contains(&self.invitation.expires_hours) {
            return Err(ConfigError::InvalidValue {
                key: "INVITATION_EXP_HOURS".to_string(),
                reason: format!("must be between 1 and {}", MAX_INVITATION_EXPIRES_HOURS),
            });
        }

        if self.server.is_production() && self.mail.is_none() {
            return Err(ConfigError::ValidationError(
                "SMTP_HOST must be configured in production".to_string(),
            ));
        }

        if self.cache.enabled && !self.cache.url.starts_with("redis") {
            return Err(ConfigError::InvalidValue {
                key: "REDIS_URL".to_string(),
                reason: "must be a redis:// or rediss:// URL".to_string(),
            });
        }

        Ok(())
    }
}
