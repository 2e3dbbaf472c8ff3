//! Dashboard composition.

use std::time::Duration;

use tollgate_core::clock::iso8601;
use tollgate_health::HealthReport;
use tollgate_metrics::names::*;
use tollgate_metrics::{ErrorLog, EventLog, MetricStore, TimeSeriesAggregator};
use tracing::debug;

use crate::views::{ChatRatios, DashboardSnapshot, LatencySummary, SeriesArrays, Totals};

const TOTALS_WINDOW: Duration = Duration::from_secs(24 * 3600);
const LATENCY_WINDOW: Duration = Duration::from_secs(3600);
const RPM_WINDOW: Duration = Duration::from_secs(60);

/// Borrowed views of everything the dashboard reads.
pub struct DashboardSources<'a> {
    pub metrics: &'a MetricStore,
    pub series: &'a TimeSeriesAggregator,
    pub events: &'a EventLog,
    pub errors: &'a ErrorLog,
    pub health: HealthReport,
    pub now_ms: u64,
}

pub fn compose(sources: DashboardSources<'_>) -> DashboardSnapshot {
    let m = sources.metrics;

    let totals = Totals {
        requests: m.counter_within(CHAT_REQUESTS, TOTALS_WINDOW),
        answered: m.counter_within(CHAT_ANSWERED, TOTALS_WINDOW),
        cache_hits: m.counter_within(CHAT_CACHE_HITS, TOTALS_WINDOW),
        rate_limited: m.counter_within(CHAT_RATE_LIMITED, TOTALS_WINDOW),
        budget_exhausted: m.counter_within(CHAT_BUDGET_EXHAUSTED, TOTALS_WINDOW),
        safety_blocked: m.counter_within(CHAT_SAFETY_BLOCKED, TOTALS_WINDOW),
        invalid: m.counter_within(CHAT_INVALID, TOTALS_WINDOW),
        upstream_failures: m.counter_within(CHAT_UPSTREAM_FAILURES, TOTALS_WINDOW),
        errors: m.counter_within(CHAT_ERRORS, TOTALS_WINDOW),
    };

    let chat = m.percentiles(CHAT_LATENCY_MS, Some(LATENCY_WINDOW));
    let inference = m.percentiles(INFERENCE_LATENCY_MS, Some(LATENCY_WINDOW));
    let latency = LatencySummary {
        p50_ms: chat.p50,
        p95_ms: chat.p95,
        p99_ms: chat.p99,
        samples: chat.count,
        inference_p50_ms: inference.p50,
        inference_p95_ms: inference.p95,
    };

    let buckets = sources.series.snapshot();
    let snapshot = DashboardSnapshot {
        generated_at: iso8601(sources.now_ms),
        health: sources.health,
        chat: ChatRatios::from_totals(&totals),
        requests_per_minute: sources.series.requests_within(RPM_WINDOW),
        latency,
        series: SeriesArrays::from_buckets(&buckets),
        recent_events: sources.events.recent(),
        recent_errors: sources.errors.recent(),
        totals,
    };

    debug!(
        requests = snapshot.totals.requests,
        buckets = buckets.len(),
        "dashboard composed"
    );
    snapshot
}
