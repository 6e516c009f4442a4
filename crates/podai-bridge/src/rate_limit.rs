//! Per-platform outbound rate limiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Length of one counting window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window counter keyed by platform id.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    state: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one send to `platform_id`.
    ///
    /// Returns `true` if the send fits within `limit` for the current window.
    pub fn check(&self, platform_id: &str, limit: u32) -> bool {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("rate limiter lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        };
        let now = Instant::now();

        let (count, start) = state
            .entry(platform_id.to_string())
            .or_insert((0, now));

        if now.duration_since(*start) >= RATE_WINDOW {
            *count = 1;
            *start = now;
            true
        } else {
            *count += 1;
            *count <= limit
        }
    }

    /// Drops the counter of a platform that was unregistered or replaced.
    pub fn reset(&self, platform_id: &str) {
        match self.state.lock() {
            Ok(mut guard) => {
                guard.remove(platform_id);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(platform_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn limits_within_window_and_resets_after() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("discord", 2));
        assert!(limiter.check("discord", 2));
        assert!(!limiter.check("discord", 2));
        // Other platforms have their own budget.
        assert!(limiter.check("slack", 2));

        tokio::time::advance(RATE_WINDOW).await;
        assert!(limiter.check("discord", 2));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_budget() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("discord", 1));
        assert!(!limiter.check("discord", 1));
        limiter.reset("discord");
        assert!(limiter.check("discord", 1));
    }
}
