//! Hour-bucketed counters for rolling totals.
//!
//! Lifetime counters answer "how many since start"; these answer "how many
//! in the last N hours". Each slot covers one wall-clock hour and holds a
//! count per counter name. Slots older than the retention are dropped on
//! the next write.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

const HOUR_MS: u64 = 3_600_000;

#[derive(Debug, Clone)]
struct HourSlot {
    start_ms: u64,
    counts: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct HourlyCounters {
    retained_hours: usize,
    slots: VecDeque<HourSlot>,
}

impl HourlyCounters {
    /// Keep `retained_hours` complete hours plus the current one.
    pub fn new(retained_hours: usize) -> Self {
        Self {
            retained_hours: retained_hours.max(1),
            slots: VecDeque::new(),
        }
    }

    pub fn add(&mut self, name: &str, amount: u64, now_ms: u64) {
        let start_ms = now_ms - now_ms % HOUR_MS;
        let oldest_kept = start_ms.saturating_sub(self.retained_hours as u64 * HOUR_MS);
        while self.slots.front().is_some_and(|s| s.start_ms < oldest_kept) {
            self.slots.pop_front();
        }

        // Clock moves forward; a stale timestamp lands in the newest slot.
        let needs_slot = self.slots.back().is_none_or(|s| s.start_ms < start_ms);
        if needs_slot {
            self.slots.push_back(HourSlot {
                start_ms,
                counts: HashMap::new(),
            });
        }
        if let Some(slot) = self.slots.back_mut() {
            let count = slot.counts.entry(name.to_string()).or_insert(0);
            *count = count.saturating_add(amount);
        }
    }

    /// Sum of `name` over every slot that overlaps `(now - window, now]`.
    pub fn total_within(&self, name: &str, window: Duration, now_ms: u64) -> u64 {
        let cutoff = now_ms.saturating_sub(window.as_millis() as u64);
        self.slots
            .iter()
            .filter(|s| s.start_ms + HOUR_MS > cutoff)
            .filter_map(|s| s.counts.get(name))
            .fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 3600);
    // 2025-03-01T12:00:00Z
    const NOON: u64 = 1_740_830_400_000;

    #[test]
    fn sums_within_window() {
        let mut c = HourlyCounters::new(24);
        c.add("requests", 2, NOON);
        c.add("requests", 1, NOON + HOUR_MS * 3);
        c.add("errors", 1, NOON + HOUR_MS * 3);
        assert_eq!(c.total_within("requests", DAY, NOON + HOUR_MS * 3), 3);
        assert_eq!(c.total_within("errors", DAY, NOON + HOUR_MS * 3), 1);
        assert_eq!(c.total_within("missing", DAY, NOON), 0);
    }

    #[test]
    fn old_hours_fall_out_of_the_day() {
        let mut c = HourlyCounters::new(24);
        c.add("requests", 1, NOON);
        assert_eq!(c.total_within("requests", DAY, NOON + HOUR_MS * 23), 1);
        assert_eq!(c.total_within("requests", DAY, NOON + HOUR_MS * 25), 0);
    }

    #[test]
    fn retention_is_bounded() {
        let mut c = HourlyCounters::new(24);
        for h in 0..100 {
            c.add("requests", 1, NOON + HOUR_MS * h);
        }
        assert_eq!(c.len(), 25);
        assert_eq!(c.total_within("requests", DAY, NOON + HOUR_MS * 99), 25);
    }

    #[test]
    fn same_hour_shares_a_slot() {
        let mut c = HourlyCounters::new(24);
        c.add("requests", 1, NOON + 10);
        c.add("requests", 1, NOON + HOUR_MS - 1);
        assert_eq!(c.len(), 1);
        assert_eq!(c.total_within("requests", DAY, NOON + HOUR_MS - 1), 2);
    }
}
