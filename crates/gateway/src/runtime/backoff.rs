//! Model-call pacing for one call: the minimum-interval gate plus the
//! exponential rate-limit backoff.
//!
//! Pure and clock-driven — every method takes `now` so the arithmetic is
//! directly testable. State is per-call, owned by that call's mailbox, and
//! never observed by another worker.

use std::time::{Duration, Instant};

/// A 429 streak resets when the last rate limit is older than this.
const STREAK_RESET_AFTER: Duration = Duration::from_secs(90);

/// First backoff step; doubles per streak entry.
const BASE_BACKOFF_MS: u64 = 6_000;

/// Backoff ceiling.
const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Default)]
pub struct BackoffState {
    last_model_run_at: Option<Instant>,
    cooldown_until: Option<Instant>,
    rate_limit_streak: u32,
    last_rate_limited_at: Option<Instant>,
}

impl BackoffState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a model call may be issued now. The cooldown gate always
    /// applies; `force` and `call_ended` bypass only the minimum-interval
    /// gate.
    pub fn model_allowed(
        &self,
        now: Instant,
        force: bool,
        call_ended: bool,
        min_interval: Duration,
    ) -> bool {
        if let Some(until) = self.cooldown_until {
            if now < until {
                return false;
            }
        }
        if force || call_ended {
            return true;
        }
        match self.last_model_run_at {
            None => true,
            Some(at) => now.duration_since(at) >= min_interval,
        }
    }

    /// Record a 429: grow the streak (resetting a stale one), then cool
    /// down for `max(6s × 2^(streak-1) capped at 60s, retry_after)`.
    pub fn on_rate_limited(&mut self, now: Instant, retry_after_ms: Option<u64>) {
        if let Some(last) = self.last_rate_limited_at {
            if now.duration_since(last) > STREAK_RESET_AFTER {
                self.rate_limit_streak = 0;
            }
        }
        self.rate_limit_streak += 1;
        self.last_rate_limited_at = Some(now);

        let exponent = self.rate_limit_streak.saturating_sub(1).min(10);
        let exp_backoff = BASE_BACKOFF_MS
            .saturating_mul(1_u64 << exponent)
            .min(MAX_BACKOFF_MS);
        let wait_ms = exp_backoff.max(retry_after_ms.unwrap_or(0));
        self.cooldown_until = Some(now + Duration::from_millis(wait_ms));
    }

    /// Record a non-429 failure: no cooldown, but the minimum-interval gate
    /// still applies to the next attempt.
    pub fn on_failure(&mut self, now: Instant) {
        self.last_model_run_at = Some(now);
    }

    /// Record a success: clear all rate-limit state.
    pub fn on_success(&mut self, now: Instant) {
        self.cooldown_until = None;
        self.rate_limit_streak = 0;
        self.last_rate_limited_at = None;
        self.last_model_run_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN_INTERVAL: Duration = Duration::from_millis(2_800);

    #[test]
    fn fresh_state_allows_a_call() {
        let b = BackoffState::new();
        assert!(b.model_allowed(Instant::now(), false, false, MIN_INTERVAL));
    }

    #[test]
    fn min_interval_gates_unforced_calls() {
        let mut b = BackoffState::new();
        let t0 = Instant::now();
        b.on_success(t0);

        let t1 = t0 + Duration::from_millis(1_000);
        assert!(!b.model_allowed(t1, false, false, MIN_INTERVAL));
        // Force and call-end bypass the interval gate.
        assert!(b.model_allowed(t1, true, false, MIN_INTERVAL));
        assert!(b.model_allowed(t1, false, true, MIN_INTERVAL));

        let t2 = t0 + MIN_INTERVAL;
        assert!(b.model_allowed(t2, false, false, MIN_INTERVAL));
    }

    #[test]
    fn retry_after_extends_past_the_exponential_floor() {
        // One 429 with Retry-After 8s: nothing until now + max(8s, 6s) = 8s.
        let mut b = BackoffState::new();
        let t0 = Instant::now();
        b.on_rate_limited(t0, Some(8_000));

        let just_before = t0 + Duration::from_millis(7_999);
        assert!(!b.model_allowed(just_before, true, true, MIN_INTERVAL));
        let at = t0 + Duration::from_millis(8_000);
        assert!(b.model_allowed(at, true, false, MIN_INTERVAL));
    }

    #[test]
    fn exponential_floor_wins_over_short_retry_after() {
        let mut b = BackoffState::new();
        let t0 = Instant::now();
        b.on_rate_limited(t0, Some(1_000));
        assert!(!b.model_allowed(t0 + Duration::from_millis(5_999), true, false, MIN_INTERVAL));
        assert!(b.model_allowed(t0 + Duration::from_millis(6_000), true, false, MIN_INTERVAL));
    }

    #[test]
    fn streak_doubles_and_caps() {
        let mut b = BackoffState::new();
        let mut t = Instant::now();
        let expected = [6_000_u64, 12_000, 24_000, 48_000, 60_000, 60_000];
        for want in expected {
            b.on_rate_limited(t, None);
            let boundary = t + Duration::from_millis(want);
            assert!(!b.model_allowed(boundary - Duration::from_millis(1), true, false, MIN_INTERVAL));
            assert!(b.model_allowed(boundary, true, false, MIN_INTERVAL));
            // Next 429 lands well inside the 90s streak window.
            t += Duration::from_secs(5);
        }
    }

    #[test]
    fn stale_streak_resets() {
        let mut b = BackoffState::new();
        let t0 = Instant::now();
        b.on_rate_limited(t0, None);
        b.on_rate_limited(t0 + Duration::from_secs(10), None); // streak 2

        // 91 seconds of quiet: next 429 starts over at 6s.
        let t1 = t0 + Duration::from_secs(101);
        b.on_rate_limited(t1, None);
        assert!(b.model_allowed(t1 + Duration::from_millis(6_000), true, false, MIN_INTERVAL));
    }

    #[test]
    fn success_clears_cooldown() {
        let mut b = BackoffState::new();
        let t0 = Instant::now();
        b.on_rate_limited(t0, Some(60_000));
        b.on_success(t0 + Duration::from_secs(1));
        // Cooldown gone; only the interval gate remains.
        assert!(b.model_allowed(t0 + Duration::from_secs(1), true, false, MIN_INTERVAL));
        assert!(!b.model_allowed(t0 + Duration::from_secs(2), false, false, MIN_INTERVAL));
    }

    #[test]
    fn plain_failure_only_bumps_the_interval() {
        let mut b = BackoffState::new();
        let t0 = Instant::now();
        b.on_failure(t0);
        assert!(!b.model_allowed(t0 + Duration::from_secs(1), false, false, MIN_INTERVAL));
        assert!(b.model_allowed(t0 + Duration::from_secs(1), true, false, MIN_INTERVAL));
        assert!(b.model_allowed(t0 + MIN_INTERVAL, false, false, MIN_INTERVAL));
    }
}
