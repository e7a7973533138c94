//! Axum extractors for authentication.
//!
//! Reads the [`AuthOutcome`] recorded by the `authenticate` middleware;
//! the token is not decoded again.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::ApiAuthError;
use super::types::{AuthOutcome, Principal};

/// Extractor for handlers that require an authenticated principal.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthOutcome>()
            .and_then(AuthOutcome::principal)
            .cloned()
            .map(Auth)
            .ok_or(ApiAuthError)
    }
}
