//! Registration and login.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::{
    ApiError, ResultExt, validate_email, validate_password, validate_username,
};
use crate::auth::{ClientIdentity, DirectoryError, UserDirectory, bounded};
use crate::db::NewUser;
use crate::jwt::JwtConfig;
use crate::password::PasswordHasher;
use crate::rate_limit::{RateLimiter, rate_limit_login, rate_limit_register};

#[derive(Clone)]
pub struct AuthState {
    pub users: Arc<dyn UserDirectory>,
    pub passwords: Arc<PasswordHasher>,
    pub jwt: Arc<JwtConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub lookup_timeout: Duration,
}

pub fn router(state: AuthState) -> Router {
    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_register,
        ));

    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_login,
        ));

    Router::new().merge(register_router).merge(login_router)
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    id: i64,
    username: String,
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    let email = payload.email.trim();

    validate_username(username)?;
    validate_email(email)?;
    validate_password(&payload.password)?;

    let taken = bounded(state.lookup_timeout, state.users.find_by_username(username))
        .await
        .map_err(|e| registration_failed("Failed to check username availability", e))?;
    if taken.is_some() {
        return Err(ApiError::conflict("Username already exists"));
    }

    let taken = bounded(state.lookup_timeout, state.users.find_by_email(email))
        .await
        .map_err(|e| registration_failed("Failed to check email availability", e))?;
    if taken.is_some() {
        return Err(ApiError::conflict("Email already exists"));
    }

    let passwords = Arc::clone(&state.passwords);
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || passwords.hash(&password))
        .await
        .internal_err("Password hashing task failed")?
        .internal_err("Failed to hash password")?;

    let new_user = NewUser {
        username,
        email,
        password_hash: &password_hash,
    };

    // A concurrent registration can claim the name between the checks above
    // and this insert; the unique constraints catch it.
    let id = match bounded(state.lookup_timeout, state.users.create(new_user)).await {
        Ok(id) => id,
        Err(DirectoryError::Duplicate) => {
            return Err(ApiError::conflict("Username or email already exists"));
        }
        Err(e) => return Err(registration_failed("Failed to create user", e)),
    };

    info!(user_id = id, username = %username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id,
            username: username.to_string(),
        }),
    ))
}

/// A timed-out directory call rejects the registration; any other
/// failure is a server error.
fn registration_failed(context: &str, e: DirectoryError) -> ApiError {
    match e {
        DirectoryError::Timeout(limit) => {
            warn!(timeout = ?limit, "{}: user lookup timed out", context);
            ApiError::unauthorized("Registration could not be completed. Please try again.")
        }
        e => ApiError::db_error(context, e),
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    token_type: &'static str,
    expires_in: u64,
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("Invalid credentials")
}

async fn login(
    State(state): State<AuthState>,
    ClientIdentity(client): ClientIdentity,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Same normalization as registration.
    let username = payload.username.trim();

    let user = match bounded(state.lookup_timeout, state.users.find_by_username(username)).await {
        Ok(user) => user,
        Err(DirectoryError::Timeout(limit)) => {
            warn!(client = %client, timeout = ?limit, "User lookup timed out during login");
            return Err(invalid_credentials());
        }
        Err(e) => return Err(ApiError::db_error("Failed to look up user", e)),
    };

    // Unknown users still pay for a verification, so response timing does
    // not reveal which usernames exist.
    let passwords = Arc::clone(&state.passwords);
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let password = payload.password;
    let verified = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => passwords.matches(&password, &hash),
        None => passwords.burn(&password),
    })
    .await
    .internal_err("Password verification task failed")?;

    let user = match user {
        Some(user) if verified => user,
        _ => {
            debug!(client = %client, "Login failed");
            return Err(invalid_credentials());
        }
    };

    let issued = state
        .jwt
        .issue(user.id, &user.username)
        .internal_err("Failed to issue token")?;

    info!(user_id = user.id, username = %user.username, "User logged in");

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_in: issued.duration,
    }))
}
