//! Named health checks.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tollgate_core::clock::iso8601;
use tollgate_core::{CheckStatus, HealthStatus};
use tracing::debug;

pub const CHECK_INFERENCE: &str = "inference";
pub const CHECK_RETRIEVAL: &str = "retrieval";
pub const CHECK_BUDGET: &str = "daily_budget";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn new(status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub uptime_secs: u64,
    pub checks: BTreeMap<String, CheckResult>,
    pub version: String,
    pub region: String,
    pub timestamp: String,
}

/// Everything the checks look at.
#[derive(Debug, Clone)]
pub struct HealthInputs {
    pub inference_configured: bool,
    pub budget_remaining: u64,
    pub budget_limit: u64,
    pub uptime: Duration,
    pub version: String,
    pub region: String,
    pub now_ms: u64,
}

/// Reduce individual statuses by precedence: down > degraded > up.
pub fn reduce<'a, I>(statuses: I) -> HealthStatus
where
    I: IntoIterator<Item = &'a CheckStatus>,
{
    let mut overall = HealthStatus::Healthy;
    for status in statuses {
        match status {
            CheckStatus::Down => return HealthStatus::Unhealthy,
            CheckStatus::Degraded => overall = HealthStatus::Degraded,
            CheckStatus::Up => {}
        }
    }
    overall
}

pub fn evaluate(inputs: &HealthInputs) -> HealthReport {
    let mut checks = BTreeMap::new();

    let inference = if inputs.inference_configured {
        CheckResult::new(CheckStatus::Up, "configured")
    } else {
        CheckResult::new(CheckStatus::Down, "inference credentials not configured")
    };
    checks.insert(CHECK_INFERENCE.to_string(), inference);

    // Retrieval falls back to static context on failure, so it is always up.
    checks.insert(
        CHECK_RETRIEVAL.to_string(),
        CheckResult::new(CheckStatus::Up, "static fallback available"),
    );

    let budget = if inputs.budget_remaining == 0 {
        CheckResult::new(CheckStatus::Degraded, "daily budget exhausted")
    } else {
        CheckResult::new(
            CheckStatus::Up,
            format!("{}/{} remaining", inputs.budget_remaining, inputs.budget_limit),
        )
    };
    checks.insert(CHECK_BUDGET.to_string(), budget);

    let status = reduce(checks.values().map(|c| &c.status));
    debug!(?status, "health evaluated");

    HealthReport {
        status,
        uptime_secs: inputs.uptime.as_secs(),
        checks,
        version: inputs.version.clone(),
        region: inputs.region.clone(),
        timestamp: iso8601(inputs.now_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> HealthInputs {
        HealthInputs {
            inference_configured: true,
            budget_remaining: 100,
            budget_limit: 500,
            uptime: Duration::from_secs(42),
            version: "0.1.0".to_string(),
            region: "local".to_string(),
            now_ms: 0,
        }
    }

    #[test]
    fn reduce_precedence() {
        use CheckStatus::*;
        assert_eq!(reduce(&[Up, Up]), HealthStatus::Healthy);
        assert_eq!(reduce(&[Up, Degraded]), HealthStatus::Degraded);
        assert_eq!(reduce(&[Degraded, Down, Up]), HealthStatus::Unhealthy);
        assert_eq!(reduce(&[] as &[CheckStatus]), HealthStatus::Healthy);
    }

    #[test]
    fn all_good_is_healthy() {
        let report = evaluate(&inputs());
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.uptime_secs, 42);
        assert_eq!(report.checks.len(), 3);
        assert_eq!(report.checks[CHECK_RETRIEVAL].status, CheckStatus::Up);
    }

    #[test]
    fn missing_credentials_is_unhealthy() {
        let report = evaluate(&HealthInputs {
            inference_configured: false,
            ..inputs()
        });
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.checks[CHECK_INFERENCE].status, CheckStatus::Down);
    }

    #[test]
    fn exhausted_budget_is_degraded() {
        let report = evaluate(&HealthInputs {
            budget_remaining: 0,
            ..inputs()
        });
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[test]
    fn serializes_lowercase_statuses() {
        let json = serde_json::to_value(evaluate(&inputs())).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["checks"]["inference"]["status"], "up");
    }
}
