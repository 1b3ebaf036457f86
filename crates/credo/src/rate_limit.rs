// Sliding-window rate limiter with in-memory storage.
//
// Keys are `identity:route`, with an additional `:email` component on the
// registration route so callers behind one NAT cannot exhaust each other's
// quota. Process-local; a multi-instance deployment puts a shared store
// behind the same interface.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use credo_core::error::AuthError;
use credo_core::models::normalize_email;
use credo_core::options::RateLimitOptions;

/// In-memory sliding-window rate limiter.
///
/// Thread-safe via `Mutex<HashMap>`. Each bucket holds the timestamps of
/// requests inside the window, oldest first.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitOptions,
    buckets: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitOptions) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Build the bucket key for a caller + route, with the per-email
    /// sub-key used on registration.
    pub fn key(identity: &str, route: &str, email: Option<&str>) -> String {
        match email {
            Some(email) => format!("{identity}:{route}:{}", normalize_email(email)),
            None => format!("{identity}:{route}"),
        }
    }

    /// Admit or reject a request.
    ///
    /// Admission records the attempt regardless of what later stages do
    /// with it. Rejection carries `retry_after`: the seconds until the
    /// oldest recorded attempt leaves the window.
    pub fn check(&self, key: &str) -> Result<(), AuthError> {
        if !self.config.enabled {
            return Ok(());
        }

        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let window = self.config.window;

        let timestamps = buckets.entry(key.to_string()).or_default();
        timestamps.retain(|ts| now.duration_since(*ts) < window);

        if timestamps.len() >= self.config.max {
            let retry_after = match timestamps.first() {
                Some(oldest) => {
                    let remaining = window.saturating_sub(now.duration_since(*oldest));
                    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
                }
                None => window.as_secs(),
            };
            return Err(AuthError::RateLimited { retry_after });
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drop buckets with no timestamps inside the window, bounding memory.
    pub fn cleanup(&self) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let window = self.config.window;
        buckets.retain(|_, timestamps| {
            timestamps.retain(|ts| now.duration_since(*ts) < window);
            !timestamps.is_empty()
        });
    }
}
