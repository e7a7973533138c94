pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use api::{AuthState, create_api_router};
use auth::{AccessPolicy, Authenticator, UserDirectory, authenticate, enforce_access};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
};
use cli::ConfigError;
use db::Database;
use jwt::JwtConfig;
use password::{PasswordConfig, PasswordHasher};
use rate_limit::{RateLimitConfig, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Per-client attempt budgets for register and login
    pub rate_limits: RateLimitConfig,
    /// Argon2 cost for new password hashes
    pub password: PasswordConfig,
    /// Upper bound on a single user lookup
    pub lookup_timeout: Duration,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

/// Create the application router with the given configuration.
///
/// Every request passes through tracing, CORS, the bearer-token
/// authenticator and then the access policy before reaching a handler.
pub fn create_app(
    config: &ServerConfig,
    rate_limiter: Arc<RateLimiter>,
) -> Result<Router, ConfigError> {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));
    let passwords = Arc::new(PasswordHasher::new(config.password)?);
    let users: Arc<dyn UserDirectory> = Arc::new(config.db.users());

    let authenticator = Arc::new(Authenticator::new(
        jwt.clone(),
        users.clone(),
        config.lookup_timeout,
    ));
    let policy = Arc::new(AccessPolicy::default());
    let cors = build_cors_layer(&config.cors_origins)?;

    let auth_state = AuthState {
        users,
        passwords,
        jwt,
        rate_limiter,
        lookup_timeout: config.lookup_timeout,
    };

    Ok(create_api_router(auth_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(middleware::from_fn_with_state(authenticator, authenticate))
            .layer(middleware::from_fn_with_state(policy, enforce_access)),
    ))
}

fn build_cors_layer(origins: &[String]) -> Result<CorsLayer, ConfigError> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| ConfigError::InvalidCorsOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(layer.allow_origin(origins))
}

/// Run an initial sweep and spawn the background sweeper for the limiter.
pub fn init_cleanup(rate_limiter: &Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    cleanup::run_sweep(rate_limiter);
    cleanup::spawn_sweep_scheduler(rate_limiter.clone())
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), ServerError> {
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limits));
    let app = create_app(&config, rate_limiter.clone())?;
    init_cleanup(&rate_limiter);

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
