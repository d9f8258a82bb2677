use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Sliding-window attempt counter keyed by `<bucket>:<client hash>`
/// (see [`crate::security::auth::ClientInfo::rate_key`]).
#[derive(Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Instant>>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Record an attempt; false once `max_attempts` already fall inside `window`.
    /// Rejected attempts are not recorded.
    pub fn check_and_record(&self, key: &str, max_attempts: u64, window: Duration) -> bool {
        self.check_and_record_at(key, max_attempts, window, Instant::now())
    }

    fn check_and_record_at(&self, key: &str, max_attempts: u64, window: Duration, now: Instant) -> bool {
        let mut map = self.lock();
        let attempts = map.entry(key.to_string()).or_default();
        attempts.retain(|t| now.duration_since(*t) < window);

        if (attempts.len() as u64) < max_attempts {
            attempts.push(now);
            true
        } else {
            false
        }
    }

    /// Forget a key, e.g. after a successful login.
    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Drop attempts older than `max_age` and keys left empty.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.lock().retain(|_, attempts| {
            attempts.retain(|t| now.duration_since(*t) < max_age);
            !attempts.is_empty()
        });
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.lock().len()
    }
}
