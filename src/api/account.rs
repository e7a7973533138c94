//! Endpoints for the signed-in user.

use axum::{Json, Router, routing::get};

use crate::auth::{Auth, Principal};

pub fn router() -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/me", get(me))
}

async fn welcome(Auth(principal): Auth) -> String {
    format!("Welcome, {}! Ready for your next session?", principal.username)
}

async fn me(Auth(principal): Auth) -> Json<Principal> {
    Json(principal)
}
