//! Scheduled cleanup of idle rate limiter state.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::rate_limit::RateLimiter;

/// Interval between sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Drop rate limiter keys with no attempts left in the window.
pub fn run_sweep(limiter: &RateLimiter) -> usize {
    let removed = limiter.sweep();
    if removed > 0 {
        info!(
            removed,
            remaining = limiter.tracked_keys(),
            "Swept idle rate limit keys"
        );
    }
    removed
}

/// Spawn a background task that sweeps periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_sweep_scheduler(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick completes immediately and there is nothing to sweep yet.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_sweep(&limiter);
        }
    })
}
