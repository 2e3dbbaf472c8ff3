//! The engine handle and its read-side operations.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tollgate_admission::{AdmissionCheck, AdmissionController, ResponseCache};
use tollgate_core::config::TollgateConfig;
use tollgate_core::{
    BatchVerdict, Clock, EngineError, Inference, Retrieval, SafetyVerdict, SystemClock,
};
use tollgate_dashboard::{DashboardSnapshot, DashboardSources, compose};
use tollgate_eval::{EvalAccess, EvalError, EvalHarness, EvalReport, EvalSelection, authorize};
use tollgate_health::{HealthInputs, HealthReport, evaluate};
use tollgate_metrics::names::*;
use tollgate_metrics::{ErrorLog, EventLog, MetricStore, TimeSeriesAggregator, render_prometheus};
use tollgate_safety::{BatchLimits, SafetyGate, validate_batch};
use tollgate_upstream::{HttpInference, Retriever};
use tracing::info;

use crate::persistence::{EMAIL_PATTERN, SessionPersistence};

/// External collaborators handed to [`Engine::new`].
pub struct EngineParts {
    pub clock: Arc<dyn Clock>,
    pub inference: Arc<dyn Inference>,
    pub retrieval: Option<Arc<dyn Retrieval>>,
    pub sessions: SessionPersistence,
}

pub struct Engine {
    pub(crate) config: TollgateConfig,
    pub(crate) clock: Arc<dyn Clock>,
    started_at_ms: u64,
    pub(crate) metrics: MetricStore,
    pub(crate) series: TimeSeriesAggregator,
    pub(crate) events: EventLog,
    pub(crate) errors: ErrorLog,
    pub(crate) admission: AdmissionController,
    pub(crate) gate: Arc<SafetyGate>,
    pub(crate) batch_limits: BatchLimits,
    pub(crate) inference: Arc<dyn Inference>,
    pub(crate) retriever: Retriever,
    pub(crate) sessions: SessionPersistence,
    pub(crate) email_pattern: Regex,
    eval: EvalHarness,
}

impl Engine {
    pub fn new(config: TollgateConfig, parts: EngineParts) -> Result<Self, EngineError> {
        let EngineParts {
            clock,
            inference,
            retrieval,
            sessions,
        } = parts;

        let gate = SafetyGate::new(config.safety.max_input_chars)
            .map(Arc::new)
            .map_err(|e| EngineError::Configuration(format!("safety signatures: {e}")))?;
        let email_pattern = Regex::new(EMAIL_PATTERN)
            .map_err(|e| EngineError::Configuration(format!("email pattern: {e}")))?;
        let retriever = Retriever::new(retrieval, config.retrieval.fallback_context.clone());
        let eval = EvalHarness::new(
            &config.eval,
            gate.clone(),
            inference.clone(),
            retriever.clone(),
            config.inference.system_prompt.clone(),
        )
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

        let m = &config.metrics;
        let engine = Self {
            started_at_ms: clock.now_ms(),
            metrics: MetricStore::new(clock.clone(), m.histogram_capacity),
            series: TimeSeriesAggregator::new(
                clock.clone(),
                Duration::from_secs(m.bucket_secs),
                m.series_buckets,
            ),
            events: EventLog::new(clock.clone(), m.event_capacity),
            errors: ErrorLog::new(clock.clone(), m.error_capacity),
            admission: AdmissionController::new(
                clock.clone(),
                &config.admission,
                ResponseCache::from_config(&config.cache.entries),
            ),
            batch_limits: BatchLimits::from(&config.safety),
            retriever,
            gate,
            inference,
            sessions,
            email_pattern,
            eval,
            clock,
            config,
        };
        engine.metrics.set_gauge(
            GAUGE_DAILY_BUDGET_REMAINING,
            engine.admission.budget_remaining() as f64,
        );

        info!(
            inference = engine.inference.is_configured(),
            persistence = engine.sessions.is_enabled(),
            kill_switch = engine.admission.kill_switch(),
            region = %engine.config.server.region,
            "engine ready"
        );
        Ok(engine)
    }

    /// Engine wired to the HTTP inference client and the system clock.
    pub fn from_config(config: TollgateConfig, sessions: SessionPersistence) -> Result<Self, EngineError> {
        let inference = Arc::new(HttpInference::from_config(&config.inference));
        Self::new(
            config,
            EngineParts {
                clock: Arc::new(SystemClock),
                inference,
                retrieval: None,
                sessions,
            },
        )
    }

    pub fn config(&self) -> &TollgateConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricStore {
        &self.metrics
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // ── Health & dashboard ─────────────────────────────────────────

    pub fn health(&self) -> HealthReport {
        let now_ms = self.clock.now_ms();
        evaluate(&HealthInputs {
            inference_configured: self.inference.is_configured(),
            budget_remaining: self.admission.budget_remaining(),
            budget_limit: self.admission.budget_limit(),
            uptime: Duration::from_millis(now_ms.saturating_sub(self.started_at_ms)),
            version: env!("CARGO_PKG_VERSION").to_string(),
            region: self.config.server.region.clone(),
            now_ms,
        })
    }

    pub fn dashboard(&self) -> DashboardSnapshot {
        compose(DashboardSources {
            metrics: &self.metrics,
            series: &self.series,
            events: &self.events,
            errors: &self.errors,
            health: self.health(),
            now_ms: self.clock.now_ms(),
        })
    }

    pub fn prometheus(&self) -> String {
        render_prometheus(&self.metrics)
    }

    // ── Admission ──────────────────────────────────────────────────

    /// Standalone admission check; consumes a token like a real request.
    pub fn check_admission(&self, source_key: &str) -> AdmissionCheck {
        let check = self.admission.check(source_key);
        self.metrics.set_gauge(
            GAUGE_DAILY_BUDGET_REMAINING,
            self.admission.budget_remaining() as f64,
        );
        check
    }

    pub fn cache_lookup(&self, query: &str) -> Option<String> {
        self.admission.cache_lookup(query).map(str::to_string)
    }

    pub fn set_kill_switch(&self, enabled: bool) {
        self.admission.set_kill_switch(enabled);
        self.events.add_event(
            "admin",
            if enabled { "kill switch enabled" } else { "kill switch disabled" },
        );
    }

    // ── Safety ─────────────────────────────────────────────────────

    pub fn sanitize(&self, text: &str) -> SafetyVerdict {
        self.gate.sanitize(text)
    }

    pub fn validate_batch(&self, messages: &Value) -> BatchVerdict {
        validate_batch(messages, &self.batch_limits)
    }

    // ── Evaluation ─────────────────────────────────────────────────

    /// Run the evaluation suite for a caller presenting `secret`.
    pub async fn run_eval(
        &self,
        selection: &EvalSelection,
        secret: Option<&str>,
    ) -> Result<EvalReport, EvalError> {
        let access = authorize(self.config.eval.secret.as_deref(), secret)?;
        self.run_eval_as(selection, access).await
    }

    /// Run the evaluation suite at a fixed tier, e.g. for a local operator.
    pub async fn run_eval_as(
        &self,
        selection: &EvalSelection,
        access: EvalAccess,
    ) -> Result<EvalReport, EvalError> {
        let report = self.eval.run(selection, access).await?;
        self.metrics.increment(EVAL_RUNS);
        self.metrics
            .set_gauge(GAUGE_LAST_EVAL_PASS_RATE, report.summary.pass_rate);
        self.events.add_event(
            "eval",
            format!(
                "{}/{} cases passed (suite {})",
                report.summary.passed, report.summary.total, report.summary.suite_version
            ),
        );
        Ok(report)
    }
}
