//! Aggregate daily budget.
//!
//! A single counter keyed by the UTC calendar date. It protects total cost
//! exposure rather than per-source abuse, so it is independent of the
//! per-source token buckets. The counter only grows within a day and is
//! replaced exactly once when the date changes.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use tollgate_core::Clock;
use tollgate_core::clock::utc_date;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetDecision {
    pub allowed: bool,
    pub used: u64,
    pub remaining: u64,
}

#[derive(Debug, Clone, Copy)]
struct DayCount {
    date: NaiveDate,
    count: u64,
}

pub struct DailyBudget {
    clock: Arc<dyn Clock>,
    limit: u64,
    state: Mutex<DayCount>,
}

impl DailyBudget {
    pub fn new(clock: Arc<dyn Clock>, limit: u64) -> Self {
        let date = utc_date(clock.now_ms());
        Self {
            clock,
            limit,
            state: Mutex::new(DayCount { date, count: 0 }),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Count one request against today's budget.
    pub fn increment(&self) -> u64 {
        let mut state = self.state.lock();
        self.roll(&mut state);
        state.count = state.count.saturating_add(1);
        state.count
    }

    /// Count one request and report whether it fits under the ceiling.
    pub fn try_consume(&self) -> BudgetDecision {
        let used = self.increment();
        BudgetDecision {
            allowed: used <= self.limit,
            used,
            remaining: self.limit.saturating_sub(used),
        }
    }

    /// True once today's count is past the ceiling.
    pub fn is_exhausted(&self) -> bool {
        self.used() > self.limit
    }

    pub fn used(&self) -> u64 {
        let mut state = self.state.lock();
        self.roll(&mut state);
        state.count
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used())
    }

    fn roll(&self, state: &mut DayCount) {
        let today = utc_date(self.clock.now_ms());
        if state.date != today {
            info!(
                previous = %state.date,
                %today,
                used = state.count,
                "daily budget reset"
            );
            *state = DayCount {
                date: today,
                count: 0,
            };
        }
    }
}
