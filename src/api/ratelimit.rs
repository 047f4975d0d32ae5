//! Per-client rate limiting for the chat API.
//!
//! Sliding-window limiter keyed by client identity. State lives in
//! process memory only: limits reset on restart and are not shared
//! across instances.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Requests allowed per identity per window
pub const MAX_REQUESTS_PER_WINDOW: usize = 5;

/// Length of the trailing rate limit window
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(10);

pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Vec<Instant>>>,
    max_per_window: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            max_per_window,
            window,
        }
    }

    /// Returns true and records the request if `client_id` is under its
    /// budget for the trailing window. Rejected attempts are not
    /// recorded.
    pub fn try_acquire(&self, client_id: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.write().expect("Rate limit lock poisoned");

        // Prune expired timestamps and drop identities whose windows
        // have fully drained so the map stays bounded across many
        // distinct clients
        buckets.retain(|_, stamps| {
            stamps.retain(|&t| now.duration_since(t) < self.window);
            !stamps.is_empty()
        });

        let stamps = buckets.entry(client_id.to_string()).or_default();
        if stamps.len() >= self.max_per_window {
            return false;
        }
        stamps.push(now);
        true
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.read().expect("Rate limit lock poisoned").len()
    }
}
