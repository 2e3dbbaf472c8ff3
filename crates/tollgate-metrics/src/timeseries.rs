//! Time-series aggregator — fixed-interval request buckets.
//!
//! Each bucket covers one `interval` slot identified by
//! `floor(now / interval)` and is mutated in place until it falls off the
//! capacity cap. Unlike the raw histograms, buckets keep the pairing of
//! request and error counts over time, which is what charts need.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tollgate_core::Clock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesBucket {
    /// Slot start, Unix milliseconds.
    pub start_ms: u64,
    pub requests: u64,
    pub errors: u64,
    pub latency_sum_ms: f64,
    pub latency_count: u64,
}

impl TimeSeriesBucket {
    fn new(start_ms: u64) -> Self {
        Self {
            start_ms,
            requests: 0,
            errors: 0,
            latency_sum_ms: 0.0,
            latency_count: 0,
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.latency_count == 0 {
            0.0
        } else {
            self.latency_sum_ms / self.latency_count as f64
        }
    }
}

pub struct TimeSeriesAggregator {
    clock: Arc<dyn Clock>,
    interval_ms: u64,
    capacity: usize,
    /// Ordered by `start_ms`, oldest first.
    buckets: Mutex<VecDeque<TimeSeriesBucket>>,
}

impl TimeSeriesAggregator {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration, capacity: usize) -> Self {
        Self {
            clock,
            interval_ms: (interval.as_millis() as u64).max(1),
            capacity: capacity.max(1),
            buckets: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    /// Total span covered by a full set of buckets.
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.interval_ms * self.capacity as u64)
    }

    /// Count one request in the bucket for the current slot.
    pub fn record_request(&self, latency_ms: f64, is_error: bool) {
        let start_ms = self.slot_start(self.clock.now_ms());
        let mut buckets = self.buckets.lock();

        let idx = match buckets.binary_search_by_key(&start_ms, |b| b.start_ms) {
            Ok(idx) => idx,
            Err(idx) => {
                buckets.insert(idx, TimeSeriesBucket::new(start_ms));
                idx
            }
        };
        let bucket = &mut buckets[idx];
        bucket.requests += 1;
        if is_error {
            bucket.errors += 1;
        }
        if latency_ms.is_finite() && latency_ms >= 0.0 {
            bucket.latency_sum_ms += latency_ms;
            bucket.latency_count += 1;
        }

        while buckets.len() > self.capacity {
            buckets.pop_front();
        }
    }

    /// Buckets inside the retention window, oldest first.
    pub fn snapshot(&self) -> Vec<TimeSeriesBucket> {
        let cutoff = self
            .clock
            .now_ms()
            .saturating_sub(self.retention().as_millis() as u64);
        self.buckets
            .lock()
            .iter()
            .filter(|b| b.start_ms >= cutoff)
            .cloned()
            .collect()
    }

    /// Sum of requests in buckets that started within `window`.
    pub fn requests_within(&self, window: Duration) -> u64 {
        let cutoff = self
            .clock
            .now_ms()
            .saturating_sub(window.as_millis() as u64);
        self.buckets
            .lock()
            .iter()
            .rev()
            .take_while(|b| b.start_ms >= cutoff)
            .map(|b| b.requests)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }

    fn slot_start(&self, now_ms: u64) -> u64 {
        (now_ms / self.interval_ms) * self.interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::ManualClock;

    fn aggregator(capacity: usize) -> (Arc<ManualClock>, TimeSeriesAggregator) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let agg = TimeSeriesAggregator::new(clock.clone(), Duration::from_secs(10), capacity);
        (clock, agg)
    }

    #[test]
    fn same_slot_mutates_in_place() {
        let (clock, agg) = aggregator(360);
        agg.record_request(100.0, false);
        clock.advance(Duration::from_secs(3));
        agg.record_request(300.0, true);

        let snap = agg.snapshot();
        assert_eq!(snap.len(), 1);
        let b = &snap[0];
        assert_eq!(b.start_ms, 1_000_000);
        assert_eq!(b.requests, 2);
        assert_eq!(b.errors, 1);
        assert_eq!(b.latency_count, 2);
        assert_eq!(b.avg_latency_ms(), 200.0);
    }

    #[test]
    fn slot_is_floored_to_interval() {
        let (clock, agg) = aggregator(360);
        clock.set(1_234_567);
        agg.record_request(1.0, false);
        assert_eq!(agg.snapshot()[0].start_ms, 1_230_000);
    }

    #[test]
    fn new_slot_creates_bucket() {
        let (clock, agg) = aggregator(360);
        agg.record_request(1.0, false);
        clock.advance(Duration::from_secs(10));
        agg.record_request(1.0, false);
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn capacity_evicts_oldest_bucket() {
        let (clock, agg) = aggregator(3);
        for _ in 0..4 {
            agg.record_request(1.0, false);
            clock.advance(Duration::from_secs(10));
        }
        assert_eq!(agg.len(), 3);
        let starts: Vec<u64> = agg.snapshot().iter().map(|b| b.start_ms).collect();
        assert_eq!(starts, vec![1_010_000, 1_020_000, 1_030_000]);
    }

    #[test]
    fn snapshot_filters_to_retention() {
        let (clock, agg) = aggregator(360);
        agg.record_request(1.0, false);
        clock.advance(Duration::from_secs(3601));
        agg.record_request(1.0, false);
        assert_eq!(agg.snapshot().len(), 1);
    }

    #[test]
    fn requests_within_last_minute() {
        let (clock, agg) = aggregator(360);
        agg.record_request(1.0, false);
        clock.advance(Duration::from_secs(120));
        agg.record_request(1.0, false);
        agg.record_request(1.0, true);
        clock.advance(Duration::from_secs(15));
        agg.record_request(1.0, false);

        assert_eq!(agg.requests_within(Duration::from_secs(60)), 3);
    }

    #[test]
    fn out_of_order_slot_keeps_ordering() {
        let (clock, agg) = aggregator(360);
        agg.record_request(1.0, false);
        clock.advance(Duration::from_secs(20));
        agg.record_request(1.0, false);
        clock.set(1_010_000);
        agg.record_request(1.0, false);

        let starts: Vec<u64> = agg.snapshot().iter().map(|b| b.start_ms).collect();
        assert_eq!(starts, vec![1_000_000, 1_010_000, 1_020_000]);
    }
}
