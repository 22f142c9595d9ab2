//! Social Identity Server
//!
//! Loads configuration from the environment, applies migrations, wires the
//! identity services together, and serves the `/v1` API.

use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use social_identity::{
    api::{AppState, RouterBuilder},
    cache::{IdentityCache, RedisIdentityCache},
    config::AppConfig,
    database::run_migrations,
    models::RoleHierarchy,
    service::{AccessResolver, AuthenticationService, Mailer, RegistrationService, SmtpMailer, TokenCodec},
    store::{PgIdentityStore, RoleStore},
    utils::Deadline,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("🚀 Starting Social Identity v{}", social_identity::VERSION);

    let config = AppConfig::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    log::info!("✅ Configuration loaded and validated");

    let pool = config
        .database
        .create_pool()
        .await
        .context("connecting to database")?;

    log::info!("🔄 Running database migrations...");
    run_migrations(&pool).await.context("running migrations")?;

    let store = Arc::new(PgIdentityStore::new(pool));

    // Role hierarchy is read once and shared immutably
    let roles = store
        .list_roles(Deadline::query())
        .await
        .context("loading roles")?;
    let hierarchy = Arc::new(RoleHierarchy::from_roles(roles).context("roles table is empty")?);
    log::info!("✅ Loaded {} roles", hierarchy.roles().len());

    let cache: Option<Arc<dyn IdentityCache>> = if config.cache.enabled {
        let cache = RedisIdentityCache::connect(&config.cache.url)
            .await
            .context("connecting to redis")?;
        log::info!("✅ Identity cache enabled");
        Some(Arc::new(cache))
    } else {
        log::warn!("⚠️  Identity cache disabled; lookups go to the database");
        None
    };

    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some(mail) => Arc::new(SmtpMailer::new(mail).context("configuring SMTP")?),
        None => {
            log::warn!("⚠️  SMTP not configured; invitation messages are only logged");
            Arc::new(SmtpMailer::log_only("Social Identity").context("loading mail templates")?)
        }
    };

    let codec = TokenCodec::new(&config.auth);

    let access = Arc::new(AccessResolver::new(
        store.clone(),
        cache,
        codec.clone(),
        hierarchy.clone(),
    ));

    let app_state = AppState {
        store: store.clone(),
        registration: Arc::new(RegistrationService::new(
            store.clone(),
            mailer,
            hierarchy,
            config.server.clone(),
            config.invitation.clone(),
        )),
        authentication: Arc::new(AuthenticationService::new(store, codec)),
        access: access.clone(),
    };

    log::info!("✅ Services initialized");

    let app = RouterBuilder::with_all_routes()
        .with_auth(access)
        .build()
        .with_state(app_state)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        );

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;

    log::info!("🌐 Listening on http://{}", bind_address);
    log::info!("📋 Endpoints:");
    log::info!("   GET    /v1/health");
    log::info!("   POST   /v1/authentication/user");
    log::info!("   PUT    /v1/users/activate/{{token}}");
    log::info!("   POST   /v1/authentication/token");
    log::info!("   GET    /v1/users/{{id}}       (bearer)");
    log::info!("   DELETE /v1/users/{{id}}       (bearer)");

    axum::serve(listener, app).await?;

    Ok(())
}
