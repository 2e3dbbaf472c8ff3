//! Snapshot types for the dashboard.
//!
//! These carry computed fields so the viewer does no arithmetic of its own.

use serde::Serialize;
use tollgate_core::clock::iso8601;
use tollgate_health::HealthReport;
use tollgate_metrics::{Event, RecentError, TimeSeriesBucket};

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub generated_at: String,
    pub health: HealthReport,
    pub totals: Totals,
    pub requests_per_minute: u64,
    pub latency: LatencySummary,
    pub chat: ChatRatios,
    pub series: SeriesArrays,
    pub recent_events: Vec<Event>,
    pub recent_errors: Vec<RecentError>,
}

/// Counter totals over the last 24 hours.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub requests: u64,
    pub answered: u64,
    pub cache_hits: u64,
    pub rate_limited: u64,
    pub budget_exhausted: u64,
    pub safety_blocked: u64,
    pub invalid: u64,
    pub upstream_failures: u64,
    pub errors: u64,
}

/// Latency percentiles over the last hour, milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub samples: usize,
    pub inference_p50_ms: f64,
    pub inference_p95_ms: f64,
}

/// Derived chat ratios, as percentages with one decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatRatios {
    pub cache_hit_rate: f64,
    pub error_rate: f64,
    pub block_rate: f64,
    pub rate_limit_rate: f64,
}

impl ChatRatios {
    pub fn from_totals(t: &Totals) -> Self {
        Self {
            cache_hit_rate: percent(t.cache_hits, t.requests),
            error_rate: percent(t.errors, t.requests),
            block_rate: percent(t.safety_blocked, t.requests),
            rate_limit_rate: percent(t.rate_limited + t.budget_exhausted, t.requests),
        }
    }
}

/// Parallel arrays, one element per 10 s bucket, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesArrays {
    pub timestamps: Vec<String>,
    pub requests: Vec<u64>,
    pub errors: Vec<u64>,
    pub avg_latency_ms: Vec<f64>,
}

impl SeriesArrays {
    pub fn from_buckets(buckets: &[TimeSeriesBucket]) -> Self {
        Self {
            timestamps: buckets.iter().map(|b| iso8601(b.start_ms)).collect(),
            requests: buckets.iter().map(|b| b.requests).collect(),
            errors: buckets.iter().map(|b| b.errors).collect(),
            avg_latency_ms: buckets.iter().map(|b| round1(b.avg_latency_ms())).collect(),
        }
    }
}

/// `numerator / denominator` as a percentage rounded to one decimal.
/// A zero denominator yields 0, never NaN or infinity.
pub fn percent(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round1(numerator as f64 / denominator as f64 * 100.0)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_guards_zero() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(5, 0), 0.0);
        assert!(percent(5, 0).is_finite());
    }

    #[test]
    fn percent_rounds_to_one_decimal() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(2, 3), 66.7);
        assert_eq!(percent(3, 3), 100.0);
    }

    #[test]
    fn ratios_from_zero_totals() {
        let r = ChatRatios::from_totals(&Totals::default());
        assert_eq!(r, ChatRatios::default());
    }

    #[test]
    fn series_arrays_align() {
        let buckets = vec![
            TimeSeriesBucket {
                start_ms: 0,
                requests: 4,
                errors: 1,
                latency_sum_ms: 10.0,
                latency_count: 3,
            },
            TimeSeriesBucket {
                start_ms: 10_000,
                requests: 0,
                errors: 0,
                latency_sum_ms: 0.0,
                latency_count: 0,
            },
        ];
        let s = SeriesArrays::from_buckets(&buckets);
        assert_eq!(s.timestamps, vec!["1970-01-01T00:00:00.000Z", "1970-01-01T00:00:10.000Z"]);
        assert_eq!(s.requests, vec![4, 0]);
        assert_eq!(s.errors, vec![1, 0]);
        assert_eq!(s.avg_latency_ms, vec![3.3, 0.0]);
    }
}
