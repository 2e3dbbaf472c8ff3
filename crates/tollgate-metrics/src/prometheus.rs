//! Prometheus text exposition format.
//!
//! Renders the metric store for scraping by a Prometheus server or
//! compatible agent. Dotted metric names become underscores under a
//! `tollgate_` prefix; histograms are exposed as summaries over the last
//! hour.

use std::time::Duration;

use crate::store::MetricStore;

const SUMMARY_WINDOW: Duration = Duration::from_secs(3600);

/// Render counters, gauges, and histogram quantiles.
pub fn render_prometheus(store: &MetricStore) -> String {
    let mut out = String::new();

    for (name, value) in store.counters() {
        let metric = format!("tollgate_{}_total", sanitize(&name));
        out.push_str(&format!("# HELP {metric} Counter {name}.\n"));
        out.push_str(&format!("# TYPE {metric} counter\n"));
        out.push_str(&format!("{metric} {value}\n"));
    }

    for (name, value) in store.gauges() {
        let metric = format!("tollgate_{}", sanitize(&name));
        out.push_str(&format!("# HELP {metric} Gauge {name}.\n"));
        out.push_str(&format!("# TYPE {metric} gauge\n"));
        out.push_str(&format!("{metric} {value:.2}\n"));
    }

    for name in store.histogram_names() {
        let metric = format!("tollgate_{}", sanitize(&name));
        let p = store.percentiles(&name, Some(SUMMARY_WINDOW));
        out.push_str(&format!("# HELP {metric} Quantiles of {name} over the last hour.\n"));
        out.push_str(&format!("# TYPE {metric} summary\n"));
        out.push_str(&format!("{metric}{{quantile=\"0.5\"}} {:.2}\n", p.p50));
        out.push_str(&format!("{metric}{{quantile=\"0.95\"}} {:.2}\n", p.p95));
        out.push_str(&format!("{metric}{{quantile=\"0.99\"}} {:.2}\n", p.p99));
        out.push_str(&format!("{metric}_count {}\n", p.count));
    }

    out
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tollgate_core::ManualClock;

    fn test_store() -> MetricStore {
        MetricStore::new(Arc::new(ManualClock::new(10_000)), 100)
    }

    #[test]
    fn render_empty() {
        assert!(render_prometheus(&test_store()).is_empty());
    }

    #[test]
    fn render_counter_gauge_and_summary() {
        let store = test_store();
        store.increment_by("chat.requests", 12);
        store.set_gauge("admission.daily_budget_remaining", 488.0);
        for v in [10.0, 20.0, 30.0] {
            store.observe("chat.latency_ms", v);
        }

        let output = render_prometheus(&store);
        assert!(output.contains("# TYPE tollgate_chat_requests_total counter"));
        assert!(output.contains("tollgate_chat_requests_total 12\n"));
        assert!(output.contains("tollgate_admission_daily_budget_remaining 488.00"));
        assert!(output.contains("tollgate_chat_latency_ms{quantile=\"0.5\"} 20.00"));
        assert!(output.contains("tollgate_chat_latency_ms{quantile=\"0.99\"} 30.00"));
        assert!(output.contains("tollgate_chat_latency_ms_count 3"));
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let store = test_store();
        store.increment("chat.requests");
        store.observe("chat.latency_ms", 5.0);
        for line in render_prometheus(&store).lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, value) = line.rsplit_once(' ').unwrap();
            assert!(name.starts_with("tollgate_"), "bad name: {line}");
            assert!(value.parse::<f64>().is_ok(), "bad value: {line}");
        }
    }
}
