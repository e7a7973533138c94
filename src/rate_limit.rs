//! Rate limiting for authentication endpoints.
//!
//! Sliding-window log per (action, client identity): each key keeps the instants
//! of its admitted attempts within the trailing window. Keys live in a sharded
//! map and each key's log has its own lock, so unrelated clients never contend.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::auth::client_identity;

/// Length of the sliding window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Registrations allowed per client identity per window.
pub const REGISTER_ATTEMPTS_PER_WINDOW: usize = 5;

/// Login attempts allowed per client identity per window.
pub const LOGIN_ATTEMPTS_PER_WINDOW: usize = 10;

/// Throttled action. Each action has its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Register,
    Login,
}

impl RateLimitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitAction::Register => "register",
            RateLimitAction::Login => "login",
        }
    }
}

/// Rate limiting configuration for authentication endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub register_limit: usize,
    pub login_limit: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: RATE_LIMIT_WINDOW,
            register_limit: REGISTER_ATTEMPTS_PER_WINDOW,
            login_limit: LOGIN_ATTEMPTS_PER_WINDOW,
        }
    }
}

impl RateLimitConfig {
    pub fn limit_for(&self, action: RateLimitAction) -> usize {
        match action {
            RateLimitAction::Register => self.register_limit,
            RateLimitAction::Login => self.login_limit,
        }
    }
}

type AttemptKey = (RateLimitAction, String);
type AttemptLog = Arc<Mutex<VecDeque<Instant>>>;

/// Per-client sliding-window limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    attempts: DashMap<AttemptKey, AttemptLog>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            attempts: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check whether an attempt is allowed and record it if so.
    pub fn allow(&self, action: RateLimitAction, identity: &str) -> bool {
        self.allow_at(action, identity, Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock.
    ///
    /// Denied attempts are not recorded, so a client that keeps hammering
    /// regains access as soon as its oldest admitted attempt leaves the window.
    pub fn allow_at(&self, action: RateLimitAction, identity: &str, now: Instant) -> bool {
        let log = self.log_for(action, identity);
        let mut times = log.lock().unwrap_or_else(|e| e.into_inner());

        self.prune(&mut times, now);

        if times.len() >= self.config.limit_for(action) {
            return false;
        }

        times.push_back(now);
        true
    }

    /// Prune every log and drop keys that have no attempts left in the window.
    /// Returns the number of keys removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.attempts.len();
        self.attempts.retain(|_, log| {
            // A log cloned out by an in-flight `allow` must survive, or its
            // attempt would be recorded in a detached bucket.
            if Arc::strong_count(log) > 1 {
                return true;
            }
            let mut times = log.lock().unwrap_or_else(|e| e.into_inner());
            self.prune(&mut times, now);
            !times.is_empty()
        });
        before.saturating_sub(self.attempts.len())
    }

    /// Number of (action, identity) keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.attempts.len()
    }

    fn log_for(&self, action: RateLimitAction, identity: &str) -> AttemptLog {
        let key = (action, identity.to_string());
        if let Some(log) = self.attempts.get(&key) {
            return Arc::clone(log.value());
        }
        Arc::clone(self.attempts.entry(key).or_default().value())
    }

    fn prune(&self, times: &mut VecDeque<Instant>, now: Instant) {
        if let Some(cutoff) = now.checked_sub(self.config.window) {
            times.retain(|&t| t >= cutoff);
        }
    }
}

/// Middleware throttling registration attempts per client.
pub async fn rate_limit_register(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    throttle(
        &limiter,
        RateLimitAction::Register,
        "Too many registration attempts. Please try again later.",
        request,
        next,
    )
    .await
}

/// Middleware throttling login attempts per client.
pub async fn rate_limit_login(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    throttle(
        &limiter,
        RateLimitAction::Login,
        "Too many login attempts. Please try again later.",
        request,
        next,
    )
    .await
}

async fn throttle(
    limiter: &RateLimiter,
    action: RateLimitAction,
    message: &'static str,
    request: Request,
    next: Next,
) -> Response {
    let client = client_identity(request.headers());

    if !limiter.allow(action, &client) {
        warn!(action = action.as_str(), client = %client, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": message })),
        )
            .into_response();
    }

    next.run(request).await
}
