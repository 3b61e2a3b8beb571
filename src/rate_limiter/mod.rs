//! Fixed-window rate limiting keyed by an arbitrary string.
//!
//! Used by the notification dispatcher with the recipient address as the key,
//! so one customer refreshing a confirmation page cannot flood their own
//! inbox. The limiter is injected rather than process-global: tests reset it,
//! and a multi-instance deployment can swap in a shared backend behind the
//! same surface.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

impl WindowEntry {
    fn new() -> Self {
        Self {
            count: 1,
            window_start: Instant::now(),
        }
    }

    fn increment(&mut self, window: Duration) {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= window {
            self.count = 1;
            self.window_start = now;
        } else {
            self.count += 1;
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 5,
            window: Duration::from_secs(60),
        }
    }
}

pub struct RecipientRateLimiter {
    entries: DashMap<String, WindowEntry>,
    config: RateLimitConfig,
}

impl RecipientRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Records one request for `key` and reports whether it fits the window.
    pub fn check(&self, key: &str) -> bool {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .and_modify(|e| e.increment(self.config.window))
            .or_insert_with(WindowEntry::new);

        let allowed = entry.count <= self.config.requests_per_window;
        if !allowed {
            debug!(key = %key, count = entry.count, "rate limit window exhausted");
        }
        // Keep the value binding alive until after the read.
        drop(entry);
        allowed
    }

    /// Clears all windows. Test hook.
    pub fn reset(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window_secs: u64) -> RecipientRateLimiter {
        RecipientRateLimiter::new(RateLimitConfig {
            requests_per_window: limit,
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let limiter = limiter(3, 60);
        assert!(limiter.check("a@example.com"));
        assert!(limiter.check("a@example.com"));
        assert!(limiter.check("a@example.com"));
        assert!(!limiter.check("a@example.com"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("a@example.com"));
        assert!(!limiter.check("a@example.com"));
        assert!(limiter.check("b@example.com"));
    }

    #[test]
    fn reset_clears_windows() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("a@example.com"));
        assert!(!limiter.check("a@example.com"));
        limiter.reset();
        assert!(limiter.check("a@example.com"));
    }

    #[test]
    fn window_expiry_reopens_the_key() {
        let limiter = limiter(1, 0);
        assert!(limiter.check("a@example.com"));
        // Zero-length window: the next call starts a fresh window.
        assert!(limiter.check("a@example.com"));
    }
}
