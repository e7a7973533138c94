//! Bearer-token authentication pass.
//!
//! [`Authenticator::authenticate`] is a pure function of the request headers
//! (plus one bounded user lookup). The [`authenticate`] middleware runs it once
//! per request and records the result as an [`AuthOutcome`] extension, which
//! the access policy and the extractors read downstream.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::bearer::bearer_token;
use super::directory::{UserDirectory, bounded};
use super::errors::AuthError;
use super::types::{AuthOutcome, Principal};
use crate::jwt::JwtConfig;

pub struct Authenticator {
    jwt: Arc<JwtConfig>,
    users: Arc<dyn UserDirectory>,
    lookup_timeout: Duration,
}

impl Authenticator {
    pub fn new(
        jwt: Arc<JwtConfig>,
        users: Arc<dyn UserDirectory>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            jwt,
            users,
            lookup_timeout,
        }
    }

    /// Resolve the principal behind the request's bearer token.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::NotAuthenticated)?;
        let claims = self.jwt.verify(token)?;

        let user = bounded(self.lookup_timeout, self.users.find_by_username(&claims.sub))
            .await?
            .ok_or(AuthError::UnknownPrincipal)?;

        // The token must still be bound to this exact account. A name that was
        // freed and re-registered gets a new id.
        if user.username != claims.sub || user.id != claims.id {
            return Err(AuthError::UnknownPrincipal);
        }

        Ok(Principal {
            user_id: user.id,
            username: user.username,
        })
    }

    /// Run the authentication pass, never failing.
    pub async fn outcome(&self, headers: &HeaderMap) -> AuthOutcome {
        match self.authenticate(headers).await {
            Ok(principal) => AuthOutcome::Authenticated(principal),
            Err(AuthError::NotAuthenticated) => AuthOutcome::Anonymous,
            Err(reason) => {
                debug!(reason = %reason, "Bearer token rejected");
                AuthOutcome::Anonymous
            }
        }
    }
}

/// Middleware that attaches an [`AuthOutcome`] to every request.
/// An already authenticated request is left as is.
pub async fn authenticate(
    State(authenticator): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let already_authenticated = request
        .extensions()
        .get::<AuthOutcome>()
        .is_some_and(AuthOutcome::is_authenticated);

    if !already_authenticated {
        let outcome = authenticator.outcome(request.headers()).await;
        request.extensions_mut().insert(outcome);
    }

    next.run(request).await
}
