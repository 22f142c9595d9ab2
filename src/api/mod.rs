//! API Layer
//!
//! HTTP API endpoints and request handling for the identity service.

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;

// Re-export commonly used types
pub use extract::JsonBody;
pub use handlers::AppState;
pub use middleware::{auth_middleware, extract_auth_user, AuthUser};
pub use routes::{create_routes, RouterBuilder, API_PREFIX};
