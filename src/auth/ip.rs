//! Client identity extraction for rate limiting.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

/// Header carrying the client address when running behind a proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Identity used when a request carries no usable client address.
/// Every such client shares one rate-limit bucket.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Extract the client identity from `X-Forwarded-For`.
/// The header can list a proxy chain; the first entry is the original client.
pub fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Extractor for the rate-limit client identity. Never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIdentity(client_identity(&parts.headers)))
    }
}
