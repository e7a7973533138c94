//! Route access policy.
//!
//! Routes are protected unless declared public. CORS preflight requests are
//! always public, whatever their path.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::errors::ApiAuthError;
use super::types::AuthOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PublicRoute {
    Exact(String),
    Prefix(String),
}

/// Declarative list of public routes.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    public: Vec<PublicRoute>,
}

impl Default for AccessPolicy {
    /// Auth entry points and the health check are public.
    fn default() -> Self {
        Self::new().permit_prefix("/auth/").permit_exact("/health")
    }
}

impl AccessPolicy {
    /// A policy with no public routes (apart from preflight requests).
    pub fn new() -> Self {
        Self { public: Vec::new() }
    }

    /// Make a single path public.
    pub fn permit_exact(mut self, path: impl Into<String>) -> Self {
        self.public.push(PublicRoute::Exact(path.into()));
        self
    }

    /// Make every path starting with `prefix` public. Include the trailing
    /// slash to match whole segments only.
    pub fn permit_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.public.push(PublicRoute::Prefix(prefix.into()));
        self
    }

    pub fn classify(&self, method: &Method, path: &str) -> RouteAccess {
        if *method == Method::OPTIONS {
            return RouteAccess::Public;
        }

        let public = self.public.iter().any(|route| match route {
            PublicRoute::Exact(p) => path == p.as_str(),
            PublicRoute::Prefix(prefix) => path.starts_with(prefix.as_str()),
        });

        if public {
            RouteAccess::Public
        } else {
            RouteAccess::Protected
        }
    }
}

/// Middleware rejecting unauthenticated requests to protected routes.
/// Must run after `authenticate`.
pub async fn enforce_access(
    State(policy): State<Arc<AccessPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    if policy.classify(request.method(), request.uri().path()) == RouteAccess::Protected {
        let authenticated = request
            .extensions()
            .get::<AuthOutcome>()
            .is_some_and(AuthOutcome::is_authenticated);

        if !authenticated {
            debug!(path = %request.uri().path(), "Rejected unauthenticated request");
            return ApiAuthError.into_response();
        }
    }

    next.run(request).await
}
