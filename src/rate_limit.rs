use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window limiter for the public write endpoints. Keys are
/// "<bucket>:<ip_hash>" so sign-in, contact and subscribe attempts
/// count separately.
pub struct RateLimiter {
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Record one attempt under `key`, returning whether it fit inside
    /// the window. A rejected attempt is not recorded.
    pub fn allow(&self, key: &str, max_attempts: u64, window: Duration) -> bool {
        let mut map = self.attempts.lock().unwrap();
        let cutoff = Instant::now() - window;

        let entry = map.entry(key.to_string()).or_default();
        entry.retain(|t| *t > cutoff);

        if (entry.len() as u64) < max_attempts {
            entry.push(Instant::now());
            true
        } else {
            false
        }
    }

    /// Drop keys with no attempts younger than `max_age`.
    pub fn sweep(&self, max_age: Duration) {
        let mut map = self.attempts.lock().unwrap();
        let cutoff = Instant::now() - max_age;
        map.retain(|_, entry| {
            entry.retain(|t| *t > cutoff);
            !entry.is_empty()
        });
    }
}
