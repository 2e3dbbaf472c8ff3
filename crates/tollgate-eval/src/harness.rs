//! Runs selected cases through the gate and the model.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tollgate_core::config::EvalConfig;
use tollgate_core::error::UPSTREAM_RETRY;
use tollgate_core::{ChatMessage, Inference, InferenceRequest, secret_matches};
use tollgate_safety::SafetyGate;
use tollgate_upstream::Retriever;
use tracing::{debug, info, warn};

use crate::cases::{CASES, EvalCategory, SUITE_VERSION};
use crate::scoring::{CheckOutcome, CompiledCase};

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("no matching evaluation cases")]
    NoCases,

    #[error("invalid case pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Caller tier, deciding the maximum number of cases per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalAccess {
    Open,
    Privileged,
}

/// Resolve the caller's tier from the configured and presented secrets.
///
/// With no secret configured everyone is `Open`. With one configured, only
/// an exact match is admitted, as `Privileged`.
pub fn authorize(configured: Option<&str>, presented: Option<&str>) -> Result<EvalAccess, EvalError> {
    match configured.filter(|s| !s.is_empty()) {
        None => Ok(EvalAccess::Open),
        Some(secret) if presented.is_some_and(|p| secret_matches(secret, p)) => {
            Ok(EvalAccess::Privileged)
        }
        Some(_) => Err(EvalError::Unauthorized),
    }
}

/// Which cases to run. Unknown ids are skipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvalSelection {
    #[serde(default)]
    pub case_ids: Option<Vec<String>>,
    #[serde(default)]
    pub max_cases: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalResult {
    pub id: String,
    pub category: EvalCategory,
    pub passed: bool,
    pub blocked: bool,
    pub latency_ms: u64,
    pub checks: Vec<CheckOutcome>,
    pub response_preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub avg_latency_ms: f64,
    pub all_passed: bool,
    pub suite_version: &'static str,
}

impl EvalSummary {
    fn from_results(results: &[EvalResult]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let (pass_rate, avg_latency_ms) = if total == 0 {
            (0.0, 0.0)
        } else {
            let latency: u64 = results.iter().map(|r| r.latency_ms).sum();
            (
                (passed as f64 / total as f64 * 1000.0).round() / 10.0,
                latency as f64 / total as f64,
            )
        };
        Self {
            total,
            passed,
            failed: total - passed,
            pass_rate,
            avg_latency_ms,
            all_passed: total > 0 && passed == total,
            suite_version: SUITE_VERSION,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub access: EvalAccess,
    pub results: Vec<EvalResult>,
    pub summary: EvalSummary,
}

pub struct EvalHarness {
    suite: Vec<CompiledCase>,
    gate: Arc<SafetyGate>,
    inference: Arc<dyn Inference>,
    retriever: Retriever,
    system_prompt: String,
    open_max_cases: usize,
    privileged_max_cases: usize,
}

impl EvalHarness {
    /// Harness over the built-in case table. Prompts that pass the gate get
    /// the same retrieved context a chat request would.
    pub fn new(
        config: &EvalConfig,
        gate: Arc<SafetyGate>,
        inference: Arc<dyn Inference>,
        retriever: Retriever,
        system_prompt: impl Into<String>,
    ) -> Result<Self, EvalError> {
        let suite = CASES
            .iter()
            .map(|c| CompiledCase::compile(*c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            suite,
            gate,
            inference,
            retriever,
            system_prompt: system_prompt.into(),
            open_max_cases: config.open_max_cases,
            privileged_max_cases: config.privileged_max_cases,
        })
    }

    pub fn max_cases(&self, access: EvalAccess) -> usize {
        match access {
            EvalAccess::Open => self.open_max_cases,
            EvalAccess::Privileged => self.privileged_max_cases,
        }
    }

    /// Cases a run would execute, in table order.
    pub fn select(&self, selection: &EvalSelection, access: EvalAccess) -> Vec<&CompiledCase> {
        let cap = selection
            .max_cases
            .map_or(self.max_cases(access), |n| n.min(self.max_cases(access)));
        self.suite
            .iter()
            .filter(|c| match &selection.case_ids {
                Some(ids) => ids.iter().any(|id| id == c.case.id),
                None => true,
            })
            .take(cap)
            .collect()
    }

    pub async fn run(&self, selection: &EvalSelection, access: EvalAccess) -> Result<EvalReport, EvalError> {
        let cases = self.select(selection, access);
        if cases.is_empty() {
            return Err(EvalError::NoCases);
        }
        info!(cases = cases.len(), ?access, "evaluation run started");

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            results.push(self.run_case(case).await);
        }

        let summary = EvalSummary::from_results(&results);
        info!(
            passed = summary.passed,
            total = summary.total,
            pass_rate = summary.pass_rate,
            "evaluation run finished"
        );
        Ok(EvalReport {
            access,
            results,
            summary,
        })
    }

    async fn run_case(&self, compiled: &CompiledCase) -> EvalResult {
        let case = &compiled.case;
        let started = Instant::now();

        // A refusal is scored as the response itself.
        let (response, blocked) = match self.gate.inspect(case.prompt) {
            Err(rejection) => (rejection.to_string(), true),
            Ok(cleaned) => {
                let system = self
                    .retriever
                    .system_instruction(&self.system_prompt, &cleaned)
                    .await;
                let request = InferenceRequest {
                    system,
                    messages: vec![ChatMessage::user(cleaned)],
                };
                match self.inference.generate(request).await {
                    Ok(text) => (text, false),
                    Err(e) => {
                        warn!(case = case.id, error = %e, "inference failed during evaluation");
                        (UPSTREAM_RETRY.to_string(), false)
                    }
                }
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        let score = compiled.score(&response);
        debug!(case = case.id, passed = score.passed, blocked, latency_ms, "case scored");

        EvalResult {
            id: case.id.to_string(),
            category: case.category,
            passed: score.passed,
            blocked,
            latency_ms,
            checks: score.checks,
            response_preview: response.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}
