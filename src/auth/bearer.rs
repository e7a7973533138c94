//! Bearer token parsing for the Authorization header.

use axum::http::{HeaderMap, header};

/// Required prefix of the Authorization header value. Case-sensitive, one space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?;
    if token.is_empty() {
        return None;
    }
    Some(token)
}
