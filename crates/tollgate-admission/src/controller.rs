//! Admission controller — the ordered composition of the limiters and the
//! response cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tollgate_core::Clock;
use tollgate_core::clock::utc_date;
use tollgate_core::config::AdmissionConfig;
use tracing::{info, warn};

use crate::budget::DailyBudget;
use crate::cache::ResponseCache;
use crate::limiter::RateLimiter;
use crate::session::SessionCounter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    RateLimited,
    BudgetExhausted,
}

/// Answer to "may this source send a request now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionCheck {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

/// Full admission outcome for a chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Go on to the safety gate and inference.
    Proceed(AdmissionCheck),
    /// Answer with operator-authored text; skip everything downstream.
    CacheHit { answer: String, check: AdmissionCheck },
    Rejected(AdmissionCheck),
}

pub struct AdmissionController {
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    budget: DailyBudget,
    cache: ResponseCache,
    kill_switch: AtomicBool,
    session_cap: u32,
}

impl AdmissionController {
    pub fn new(clock: Arc<dyn Clock>, config: &AdmissionConfig, cache: ResponseCache) -> Self {
        Self {
            limiter: RateLimiter::new(
                clock.clone(),
                config.requests_per_window,
                Duration::from_secs(config.window_secs),
            ),
            budget: DailyBudget::new(clock.clone(), config.daily_budget),
            clock,
            cache,
            kill_switch: AtomicBool::new(config.kill_switch),
            session_cap: config.session_cap,
        }
    }

    /// Kill switch, limits, and budget, in that order.
    pub fn check(&self, source_key: &str) -> AdmissionCheck {
        if self.kill_switch() {
            return AdmissionCheck {
                allowed: true,
                remaining: self.limiter.limit(),
                reset_at_ms: self.clock.now_ms() + self.limiter.window().as_millis() as u64,
                message: None,
                reason: None,
            };
        }

        let rate = self.limiter.check(source_key);
        if !rate.allowed {
            let wait_secs = rate
                .reset_at_ms
                .saturating_sub(self.clock.now_ms())
                .div_ceil(1000);
            return AdmissionCheck {
                allowed: false,
                remaining: 0,
                reset_at_ms: rate.reset_at_ms,
                message: Some(format!(
                    "Too many requests. Please wait {wait_secs} seconds before trying again."
                )),
                reason: Some(RejectReason::RateLimited),
            };
        }

        let budget = self.budget.try_consume();
        if !budget.allowed {
            warn!(used = budget.used, limit = self.budget.limit(), "daily budget exhausted");
            return AdmissionCheck {
                allowed: false,
                remaining: 0,
                reset_at_ms: self.next_midnight_ms(),
                message: Some(
                    "The assistant has reached its daily message limit. Please come back tomorrow."
                        .to_string(),
                ),
                reason: Some(RejectReason::BudgetExhausted),
            };
        }

        AdmissionCheck {
            allowed: true,
            remaining: rate.remaining,
            reset_at_ms: rate.reset_at_ms,
            message: None,
            reason: None,
        }
    }

    pub fn cache_lookup(&self, query: &str) -> Option<&str> {
        self.cache.lookup(query)
    }

    /// Limits first, then the response cache.
    pub fn admit(&self, source_key: &str, query: &str) -> Admission {
        let check = self.check(source_key);
        if !check.allowed {
            return Admission::Rejected(check);
        }
        match self.cache.lookup(query) {
            Some(answer) => Admission::CacheHit {
                answer: answer.to_string(),
                check,
            },
            None => Admission::Proceed(check),
        }
    }

    pub fn kill_switch(&self) -> bool {
        self.kill_switch.load(Ordering::Relaxed)
    }

    /// Relax or restore limiting without a redeploy.
    pub fn set_kill_switch(&self, enabled: bool) {
        let previous = self.kill_switch.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            info!(enabled, "admission kill switch changed");
        }
    }

    pub fn budget_remaining(&self) -> u64 {
        self.budget.remaining()
    }

    pub fn budget_limit(&self) -> u64 {
        self.budget.limit()
    }

    /// Soft-cap status for a client-reported turn count.
    pub fn session(&self, user_turns: u32) -> SessionCounter {
        SessionCounter::from_count(user_turns, self.session_cap)
    }

    fn next_midnight_ms(&self) -> u64 {
        let tomorrow = utc_date(self.clock.now_ms()).succ_opt();
        tomorrow
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp_millis() as u64)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::ManualClock;

    // 2025-03-01T12:00:00Z
    const NOON: u64 = 1_740_830_400_000;

    fn controller(limit: u32, budget: u64) -> (Arc<ManualClock>, AdmissionController) {
        let clock = Arc::new(ManualClock::new(NOON));
        let config = AdmissionConfig {
            requests_per_window: limit,
            window_secs: 60,
            daily_budget: budget,
            kill_switch: false,
            session_cap: 3,
        };
        let cache = ResponseCache::new([("what is your tech stack", "Rust.")]);
        (clock.clone(), AdmissionController::new(clock, &config, cache))
    }

    #[test]
    fn rate_limit_rejection_is_actionable() {
        let (_, ac) = controller(1, 100);
        assert!(ac.check("a").allowed);
        let rejected = ac.check("a");
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reason, Some(RejectReason::RateLimited));
        assert!(rejected.message.unwrap().contains("60 seconds"));
    }

    #[test]
    fn budget_is_shared_across_sources() {
        let (_, ac) = controller(10, 2);
        assert!(ac.check("a").allowed);
        assert!(ac.check("b").allowed);
        let third = ac.check("c");
        assert!(!third.allowed);
        assert_eq!(third.reason, Some(RejectReason::BudgetExhausted));
        // Resets at the next UTC midnight.
        assert_eq!(third.reset_at_ms, NOON + 12 * 3_600_000);
    }

    #[test]
    fn kill_switch_bypasses_limits() {
        let (_, ac) = controller(1, 1);
        ac.set_kill_switch(true);
        for _ in 0..10 {
            let check = ac.check("a");
            assert!(check.allowed);
            assert_eq!(check.remaining, 1);
        }
        assert_eq!(ac.budget_remaining(), 1);

        ac.set_kill_switch(false);
        assert!(ac.check("a").allowed);
        assert!(!ac.check("a").allowed);
    }

    #[test]
    fn admit_short_circuits_on_cache() {
        let (_, ac) = controller(5, 100);
        match ac.admit("a", "Tech stack") {
            Admission::CacheHit { answer, check } => {
                assert_eq!(answer, "Rust.");
                assert_eq!(check.remaining, 4);
            }
            other => panic!("expected cache hit, got {other:?}"),
        }
        assert!(matches!(ac.admit("a", "something else"), Admission::Proceed(_)));
    }

    #[test]
    fn admit_rejects_before_cache() {
        let (_, ac) = controller(0, 100);
        assert!(matches!(
            ac.admit("a", "what is your tech stack"),
            Admission::Rejected(_)
        ));
    }

    #[test]
    fn session_cap_from_config() {
        let (_, ac) = controller(5, 100);
        assert!(!ac.session(2).is_capped());
        assert!(ac.session(3).is_capped());
    }
}
