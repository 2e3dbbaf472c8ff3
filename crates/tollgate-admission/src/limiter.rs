//! Per-source token bucket with a fixed window.
//!
//! Each source key gets `limit` tokens per window. When the window rolls
//! over the state is replaced wholesale rather than leaked back gradually.
//! Entries are created on first touch and superseded on rollover; nothing
//! garbage-collects idle keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tollgate_core::Clock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateLimitState {
    remaining: u32,
    reset_at_ms: u64,
}

/// Result of taking one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: u64,
}

pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    limit: u32,
    window_ms: u64,
    states: Mutex<HashMap<String, RateLimitState>>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, limit: u32, window: Duration) -> Self {
        Self {
            clock,
            limit,
            window_ms: (window.as_millis() as u64).max(1),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Take a token for `key` if one is available.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = self.clock.now_ms();
        let mut states = self.states.lock();

        let state = states
            .entry(key.to_string())
            .or_insert_with(|| self.fresh(now));
        if now >= state.reset_at_ms {
            *state = self.fresh(now);
        }

        if state.remaining == 0 {
            debug!(source = %key, reset_at_ms = state.reset_at_ms, "rate limit exhausted");
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_at_ms: state.reset_at_ms,
            };
        }

        state.remaining -= 1;
        RateDecision {
            allowed: true,
            remaining: state.remaining,
            reset_at_ms: state.reset_at_ms,
        }
    }

    /// Current state for `key` without consuming anything.
    pub fn peek(&self, key: &str) -> RateDecision {
        let now = self.clock.now_ms();
        let states = self.states.lock();
        match states.get(key) {
            Some(s) if now < s.reset_at_ms => RateDecision {
                allowed: s.remaining > 0,
                remaining: s.remaining,
                reset_at_ms: s.reset_at_ms,
            },
            _ => RateDecision {
                allowed: self.limit > 0,
                remaining: self.limit,
                reset_at_ms: now + self.window_ms,
            },
        }
    }

    /// Number of keys ever touched (including rolled-over ones).
    pub fn tracked_sources(&self) -> usize {
        self.states.lock().len()
    }

    fn fresh(&self, now: u64) -> RateLimitState {
        RateLimitState {
            remaining: self.limit,
            reset_at_ms: now + self.window_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::ManualClock;

    fn limiter(limit: u32) -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = RateLimiter::new(clock.clone(), limit, Duration::from_secs(60));
        (clock, limiter)
    }

    #[test]
    fn exhausts_then_resets_after_window() {
        let (clock, rl) = limiter(3);

        assert_eq!(rl.check("1.2.3.4").remaining, 2);
        assert_eq!(rl.check("1.2.3.4").remaining, 1);
        let third = rl.check("1.2.3.4");
        assert!(third.allowed);
        assert_eq!(third.remaining, 0);

        let fourth = rl.check("1.2.3.4");
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);
        assert_eq!(fourth.reset_at_ms, 1_060_000);

        clock.advance(Duration::from_secs(60));
        let fifth = rl.check("1.2.3.4");
        assert!(fifth.allowed);
        assert_eq!(fifth.remaining, 2);
        assert_eq!(fifth.reset_at_ms, 1_120_000);
    }

    #[test]
    fn sources_are_independent() {
        let (_, rl) = limiter(1);
        assert!(rl.check("a").allowed);
        assert!(!rl.check("a").allowed);
        assert!(rl.check("b").allowed);
        assert_eq!(rl.tracked_sources(), 2);
    }

    #[test]
    fn zero_limit_always_rejects() {
        let (_, rl) = limiter(0);
        let d = rl.check("a");
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn repeated_rejections_never_go_negative() {
        let (_, rl) = limiter(1);
        rl.check("a");
        for _ in 0..10 {
            assert_eq!(rl.check("a").remaining, 0);
        }
    }

    #[test]
    fn peek_does_not_consume() {
        let (_, rl) = limiter(2);
        assert_eq!(rl.peek("a").remaining, 2);
        rl.check("a");
        assert_eq!(rl.peek("a").remaining, 1);
        assert_eq!(rl.peek("a").remaining, 1);
    }

    #[test]
    fn burst_across_adjacent_windows() {
        let (clock, rl) = limiter(3);
        clock.advance(Duration::from_secs(59));
        // Window opens here and runs until +60 s.
        let allowed_first = (0..3).filter(|_| rl.check("a").allowed).count();
        clock.advance(Duration::from_secs(60));
        let allowed_second = (0..3).filter(|_| rl.check("a").allowed).count();
        assert_eq!(allowed_first + allowed_second, 6);
    }
}
