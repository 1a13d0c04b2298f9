//! Process-wide request pacing: a fixed-window per-key limiter (lazy reset)
//! and a per-case cooldown map. Both are pruned lazily on access and from
//! the 60 s background pruner.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Window {
    started: Instant,
    count: u32,
}

/// Per-key fixed-window limiter. The window resets lazily on the first
/// `take` after it expires.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Consume one slot for `key`. Returns false when the window is full.
    pub fn take(&self, key: &str, limit: u32, window: Duration) -> bool {
        let mut windows = self.windows.lock();
        let now = Instant::now();

        let w = windows.entry(key.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(w.started) >= window {
            w.started = now;
            w.count = 0;
        }
        if w.count >= limit {
            return false;
        }
        w.count += 1;
        true
    }

    /// Drop windows older than `horizon`.
    pub fn prune(&self, horizon: Duration) {
        let now = Instant::now();
        self.windows
            .lock()
            .retain(|_, w| now.duration_since(w.started) < horizon);
    }
}

/// Per-key cooldowns (e.g. one call initiation per case per 30 s).
pub struct CooldownMap {
    until: Mutex<HashMap<String, Instant>>,
}

impl Default for CooldownMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownMap {
    pub fn new() -> Self {
        Self {
            until: Mutex::new(HashMap::new()),
        }
    }

    /// Try to start a cooldown for `key`. Returns 0 on success, otherwise
    /// the remaining seconds (rounded up).
    pub fn take(&self, key: &str, cooldown: Duration) -> u64 {
        let mut until = self.until.lock();
        let now = Instant::now();

        if let Some(t) = until.get(key) {
            if *t > now {
                let remaining = t.duration_since(now);
                return remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            }
        }
        until.insert(key.to_owned(), now + cooldown);
        0
    }

    /// Drop spent cooldowns.
    pub fn prune(&self) {
        let now = Instant::now();
        self.until.lock().retain(|_, t| *t > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_exhausts_and_lazily_resets() {
        let limiter = RateLimiter::new();
        let window = Duration::from_millis(30);

        assert!(limiter.take("ip1", 2, window));
        assert!(limiter.take("ip1", 2, window));
        assert!(!limiter.take("ip1", 2, window));
        // Other keys are unaffected.
        assert!(limiter.take("ip2", 2, window));

        std::thread::sleep(Duration::from_millis(35));
        assert!(limiter.take("ip1", 2, window));
    }

    #[test]
    fn limiter_prunes_old_windows() {
        let limiter = RateLimiter::new();
        assert!(limiter.take("ip1", 1, Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(5));
        limiter.prune(Duration::from_millis(1));
        assert!(limiter.windows.lock().is_empty());
    }

    #[test]
    fn cooldown_reports_remaining_seconds() {
        let cooldowns = CooldownMap::new();
        assert_eq!(cooldowns.take("case-1", Duration::from_secs(30)), 0);

        let remaining = cooldowns.take("case-1", Duration::from_secs(30));
        assert!((1..=30).contains(&remaining), "remaining {remaining}");

        // A different case has its own cooldown.
        assert_eq!(cooldowns.take("case-2", Duration::from_secs(30)), 0);
    }

    #[test]
    fn cooldown_expires() {
        let cooldowns = CooldownMap::new();
        assert_eq!(cooldowns.take("case-1", Duration::from_millis(10)), 0);
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(cooldowns.take("case-1", Duration::from_millis(10)), 0);
    }
}
