//! Authentication Middleware
//!
//! Bearer token authentication for protected API endpoints.

use crate::models::Account;
use crate::service::AccessResolver;
use crate::utils::error::AppError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extension type for storing the authenticated account in request extensions
#[derive(Debug, Clone)]
pub struct AuthUser(pub Account);

/// Authentication middleware that resolves the bearer token to an activated
/// account
///
/// Any failure (missing header, wrong scheme, invalid or expired token,
/// unknown subject) returns 401 Unauthorized.
pub async fn auth_middleware(
    State(access): State<Arc<AccessResolver>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    let account = access.resolve_bearer(auth_header).await?;

    request.extensions_mut().insert(AuthUser(account));

    Ok(next.run(request).await)
}

/// Helper function to extract the authenticated account from request extensions
///
/// The auth_middleware must be applied to the route for this to work.
pub fn extract_auth_user(request: &Request) -> Result<&Account, AppError> {
    request
        .extensions()
        .get::<AuthUser>()
        .map(|auth_user| &auth_user.0)
        .ok_or_else(|| {
            AppError::Authentication("Account not found in request extensions".into())
        })
}
