//! Authentication error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use super::directory::DirectoryError;
use crate::jwt::JwtError;

/// Why a request did not authenticate. Only ever logged; clients see
/// [`ApiAuthError`], which does not say which step failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No bearer token presented")]
    NotAuthenticated,
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),
    #[error("Token subject does not resolve to a live account")]
    UnknownPrincipal,
    #[error("User lookup failed: {0}")]
    Lookup(#[from] DirectoryError),
}

/// Rejection for requests that need an authenticated principal.
#[derive(Debug)]
pub struct ApiAuthError;

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Not authenticated",
            }),
        )
            .into_response();

        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));

        response
    }
}
