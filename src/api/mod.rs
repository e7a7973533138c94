mod account;
mod auth;
mod error;
mod health;

use axum::Router;

pub use auth::AuthState;

/// Create the API router.
pub fn create_api_router(auth_state: AuthState) -> Router {
    Router::new()
        .nest("/auth", auth::router(auth_state))
        .merge(account::router())
        .merge(health::router())
}
