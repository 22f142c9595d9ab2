//! API Route Definitions
//!
//! All routes live under `/v1`. The RouterBuilder allows selective enabling of
//! endpoints; bearer-protected endpoints are only mounted once an access
//! resolver has been supplied with `with_auth`.

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};

use super::handlers::*;
use super::middleware::auth_middleware;
use crate::service::AccessResolver;

/// Prefix shared by every endpoint
pub const API_PREFIX: &str = "/v1";

/// Builder for creating API routes with configurable endpoints
#[derive(Default)]
pub struct RouterBuilder {
    /// GET /v1/health
    health_check: bool,
    /// POST /v1/authentication/user
    register_user: bool,
    /// PUT /v1/users/activate/{token}
    activate_user: bool,
    /// POST /v1/authentication/token
    create_token: bool,
    /// GET /v1/users/{id} (bearer-protected)
    get_user: bool,
    /// DELETE /v1/users/{id} (bearer-protected)
    delete_user: bool,
    /// Resolver used by the bearer middleware
    auth: Option<Arc<AccessResolver>>,
}

impl RouterBuilder {
    /// Creates a new router builder with all routes disabled by default
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router builder with all routes enabled
    pub fn with_all_routes() -> Self {
        Self {
            health_check: true,
            register_user: true,
            activate_user: true,
            create_token: true,
            get_user: true,
            delete_user: true,
            auth: None,
        }
    }

    /// Creates a router with only the health check endpoint
    pub fn with_minimal_routes() -> Self {
        Self::new().health_check(true)
    }

    pub fn health_check(mut self, enabled: bool) -> Self {
        self.health_check = enabled;
        self
    }

    pub fn register_user(mut self, enabled: bool) -> Self {
        self.register_user = enabled;
        self
    }

    pub fn activate_user(mut self, enabled: bool) -> Self {
        self.activate_user = enabled;
        self
    }

    pub fn create_token(mut self, enabled: bool) -> Self {
        self.create_token = enabled;
        self
    }

    pub fn get_user(mut self, enabled: bool) -> Self {
        self.get_user = enabled;
        self
    }

    pub fn delete_user(mut self, enabled: bool) -> Self {
        self.delete_user = enabled;
        self
    }

    /// Protect account endpoints with bearer authentication
    pub fn with_auth(mut self, access: Arc<AccessResolver>) -> Self {
        self.auth = Some(access);
        self
    }

    /// Builds the Axum router with the configured routes
    pub fn build(self) -> Router<AppState> {
        let mut public = Router::new();

        if self.health_check {
            public = public.route("/health", get(health_check));
        }

        if self.register_user {
            public = public.route("/authentication/user", post(register_user));
        }

        if self.activate_user {
            public = public.route("/users/activate/{token}", put(activate_user));
        }

        if self.create_token {
            public = public.route("/authentication/token", post(create_token));
        }

        match (self.auth, self.get_user, self.delete_user) {
            (_, false, false) => {}
            (None, _, _) => {
                log::warn!("account routes requested without an access resolver; not mounted");
            }
            (Some(access), get_enabled, delete_enabled) => {
                let mut user_routes: MethodRouter<AppState> = MethodRouter::new();
                if get_enabled {
                    user_routes = user_routes.merge(get(get_user));
                }
                if delete_enabled {
                    user_routes = user_routes.merge(delete(delete_user));
                }

                let protected = Router::new()
                    .route("/users/{id}", user_routes)
                    .route_layer(from_fn_with_state(access, auth_middleware));
                public = public.merge(protected);
            }
        }

        Router::new().nest(API_PREFIX, public)
    }
}

/// Creates all API routes guarded by `access`
pub fn create_routes(access: Arc<AccessResolver>) -> Router<AppState> {
    RouterBuilder::with_all_routes().with_auth(access).build()
}
