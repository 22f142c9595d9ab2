//! HTTP Request Handlers
//!
//! Axum handlers for processing HTTP requests and responses.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;

use crate::{
    api::{extract::JsonBody, middleware::AuthUser},
    models::{requests::*, Account, IssuedToken},
    service::{AccessResolver, AuthenticationService, RegistrationService},
    store::IdentityStore,
    utils::{deadline::Deadline, error::AppResult, validation::validate_request},
    VERSION,
};

/// Role required to act on another account
pub const ACCOUNT_ADMIN_ROLE: &str = "admin";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IdentityStore>,
    pub registration: Arc<RegistrationService>,
    pub authentication: Arc<AuthenticationService>,
    pub access: Arc<AccessResolver>,
}

/// Standard success response wrapper
#[derive(serde::Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Register a new pending account and send its invitation
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterAccountRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<RegisteredAccountResponse>>)> {
    let (account, token) = state.registration.register(request).await?;

    let response = RegisteredAccountResponse {
        account,
        token: token.into_string(),
    };

    Ok((StatusCode::CREATED, Json(SuccessResponse::new(response))))
}

/// Redeem an invitation token
pub async fn activate_user(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<StatusCode> {
    state.registration.activate(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Exchange credentials for a bearer token
pub async fn create_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateTokenRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<IssuedToken>>)> {
    validate_request(&request)?;

    let token = state
        .authentication
        .authenticate(&request.email, &request.password)
        .await?;

    Ok((StatusCode::CREATED, Json(SuccessResponse::new(token))))
}

/// Get an activated account by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> AppResult<Json<SuccessResponse<Account>>> {
    let account = state.access.resolve_identity(account_id).await?;
    Ok(Json(SuccessResponse::new(account)))
}

/// Delete an account; admins may delete any account, everyone else only their own
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(account_id): Path<i64>,
) -> AppResult<StatusCode> {
    state
        .access
        .authorize(&caller, ACCOUNT_ADMIN_ROLE, Some(account_id))?;

    state
        .store
        .delete_account(account_id, Deadline::query())
        .await?;
    state.access.forget_identity(account_id).await?;

    log::info!(
        "Deleted account account_id={} by account_id={}",
        account_id,
        caller.id
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Health check endpoint
pub async fn health_check(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<HealthCheckResponse>>> {
    // Check database connectivity
    state.store.health_check(Deadline::query()).await?;

    let response = HealthCheckResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: VERSION.to_string(),
    };

    Ok(Json(SuccessResponse::new(response)))
}
