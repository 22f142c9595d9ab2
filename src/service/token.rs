//! Bearer Token Codec
//!
//! Signs and validates HS256 bearer tokens. Validation is pure; it performs
//! no I/O and never consults the store.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::models::{BearerClaims, IssuedToken};

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Bearer token codec bound to one signing secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    expires_in: Duration,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            expires_in: config.token_lifetime(),
        }
    }

    /// Sign an arbitrary claim set
    pub fn generate(&self, claims: &BearerClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Issue a token for `account_id` with the configured lifetime
    pub fn issue(&self, account_id: i64) -> Result<IssuedToken, TokenError> {
        let claims = BearerClaims::new(
            account_id,
            Utc::now(),
            self.expires_in,
            &self.issuer,
            &self.audience,
        );
        let token = self.generate(&claims)?;
        Ok(IssuedToken::new(token, self.expires_in.num_seconds()))
    }

    /// Verify signature, algorithm, time bounds, issuer and audience
    pub fn validate(&self, token: &str) -> Result<BearerClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["sub", "exp", "nbf", "iss", "aud"]);

        decode::<BearerClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            secret: secret.to_string(),
            token_expires_hours: 72,
            issuer: "social-identity".to_string(),
            audience: "social-identity".to_string(),
        }
    }

    fn claims_at(offset: Duration, lifetime: Duration) -> BearerClaims {
        BearerClaims::new(
            7,
            Utc::now() + offset,
            lifetime,
            "social-identity",
            "social-identity",
        )
    }

    #[test]
    fn test_issue_and_validate() {
        let codec = TokenCodec::new(&config("secret"));
        let issued = codec.issue(7).unwrap();

        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 72 * 3600);

        let claims = codec.validate(&issued.token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.aud, "social-identity");
    }

    #[test]
    fn test_large_subject_survives_exactly() {
        let codec = TokenCodec::new(&config("secret"));
        let subject = 9_007_199_254_740_993_i64;
        let claims = BearerClaims::new(
            subject,
            Utc::now(),
            Duration::hours(1),
            "social-identity",
            "social-identity",
        );

        let token = codec.generate(&claims).unwrap();
        assert_eq!(codec.validate(&token).unwrap().sub, subject);
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = TokenCodec::new(&config("secret"));
        let token = codec
            .generate(&claims_at(Duration::hours(-2), Duration::hours(1)))
            .unwrap();

        assert!(matches!(codec.validate(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_not_yet_valid_token_rejected() {
        let codec = TokenCodec::new(&config("secret"));
        let token = codec
            .generate(&claims_at(Duration::hours(1), Duration::hours(1)))
            .unwrap();

        assert!(codec.validate(&token).is_err());
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let ours = TokenCodec::new(&config("secret"));
        let theirs = TokenCodec::new(&config("another-secret"));
        let token = theirs.issue(7).unwrap().token;

        assert!(matches!(ours.validate(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let codec = TokenCodec::new(&config("secret"));
        let claims = BearerClaims::new(
            7,
            Utc::now(),
            Duration::hours(1),
            "social-identity",
            "someone-else",
        );
        let token = codec.generate(&claims).unwrap();

        assert!(codec.validate(&token).is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        let codec = TokenCodec::new(&config("secret"));
        assert!(codec.validate("not.a.jwt.at.all").is_err());
        assert!(codec.validate("").is_err());
    }
}
