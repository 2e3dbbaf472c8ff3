//! Metric store — named counters, gauges, and capped histograms.
//!
//! Entries are created lazily on first write and live for the life of the
//! process. Counters are also tallied per hour so rolling totals can be
//! read back with [`MetricStore::counter_within`]. Histograms keep arrival
//! order and drop the oldest sample once the capacity is reached, so
//! percentile queries always see the most recent window of activity.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tollgate_core::Clock;

use crate::bounded::BoundedPush;
use crate::rolling::HourlyCounters;

/// Hours of per-hour counter history kept for rolling totals.
const HOURLY_RETENTION: usize = 24;

/// One histogram observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub at_ms: u64,
    pub value: f64,
}

/// p50/p95/p99 computed from a single sorted sample set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

pub struct MetricStore {
    clock: Arc<dyn Clock>,
    histogram_capacity: usize,
    counters: RwLock<HashMap<String, u64>>,
    hourly: Mutex<HourlyCounters>,
    gauges: RwLock<HashMap<String, f64>>,
    histograms: RwLock<HashMap<String, VecDeque<Sample>>>,
}

impl MetricStore {
    pub fn new(clock: Arc<dyn Clock>, histogram_capacity: usize) -> Self {
        Self {
            clock,
            histogram_capacity: histogram_capacity.max(1),
            counters: RwLock::new(HashMap::new()),
            hourly: Mutex::new(HourlyCounters::new(HOURLY_RETENTION)),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
        }
    }

    /// Add one to a counter.
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Add `amount` to a counter. Saturates instead of wrapping.
    pub fn increment_by(&self, name: &str, amount: u64) {
        {
            let mut counters = self.counters.write();
            let slot = counters.entry(name.to_string()).or_insert(0);
            *slot = slot.saturating_add(amount);
        }
        self.hourly.lock().add(name, amount, self.clock.now_ms());
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        self.gauges.write().insert(name.to_string(), value);
    }

    /// Append a timestamped observation, truncating the oldest past capacity.
    pub fn observe(&self, name: &str, value: f64) {
        let sample = Sample {
            at_ms: self.clock.now_ms(),
            value,
        };
        let mut histograms = self.histograms.write();
        histograms
            .entry(name.to_string())
            .or_default()
            .push_bounded(sample, self.histogram_capacity);
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.read().get(name).copied().unwrap_or(0)
    }

    /// Counter increments made within roughly the last `window`, at hour
    /// granularity. Windows past 24 hours see only 24 hours.
    pub fn counter_within(&self, name: &str, window: Duration) -> u64 {
        self.hourly
            .lock()
            .total_within(name, window, self.clock.now_ms())
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.read().get(name).copied()
    }

    /// Retained samples of a histogram, oldest first.
    pub fn samples(&self, name: &str) -> Vec<Sample> {
        self.histograms
            .read()
            .get(name)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Nearest-rank percentile of a histogram, optionally restricted to
    /// samples no older than `window`. Returns 0 when nothing qualifies.
    pub fn percentile(&self, name: &str, p: f64, window: Option<Duration>) -> f64 {
        let sorted = self.sorted_values(name, window);
        rank(&sorted, p)
    }

    /// p50/p95/p99 over one consistent sample set.
    pub fn percentiles(&self, name: &str, window: Option<Duration>) -> Percentiles {
        let sorted = self.sorted_values(name, window);
        Percentiles {
            p50: rank(&sorted, 50.0),
            p95: rank(&sorted, 95.0),
            p99: rank(&sorted, 99.0),
            count: sorted.len(),
        }
    }

    /// Mean of the windowed samples, 0 when empty.
    pub fn mean(&self, name: &str, window: Option<Duration>) -> f64 {
        let values = self.sorted_values(name, window);
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    pub fn counters(&self) -> BTreeMap<String, u64> {
        self.counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub fn gauges(&self) -> BTreeMap<String, f64> {
        self.gauges
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub fn histogram_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.histograms.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn sorted_values(&self, name: &str, window: Option<Duration>) -> Vec<f64> {
        let cutoff = window.map(|w| self.clock.now_ms().saturating_sub(w.as_millis() as u64));
        let mut values: Vec<f64> = {
            let histograms = self.histograms.read();
            let Some(samples) = histograms.get(name) else {
                return Vec::new();
            };
            samples
                .iter()
                .filter(|s| cutoff.is_none_or(|c| s.at_ms >= c))
                .map(|s| s.value)
                .collect()
        };
        values.sort_by(|a, b| a.total_cmp(b));
        values
    }
}

/// Element at `ceil(p/100 · n) - 1` of an ascending slice.
fn rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let n = sorted.len();
    let idx = ((p / 100.0) * n as f64).ceil() as usize;
    sorted[idx.saturating_sub(1).min(n - 1)]
}
