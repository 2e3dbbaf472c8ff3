//! tollgate.toml configuration parser.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working single-instance setup with inference unconfigured.
//! Secrets are normally supplied through environment overrides rather than
//! the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TollgateConfig {
    pub server: ServerConfig,
    pub admission: AdmissionConfig,
    pub safety: SafetyConfig,
    pub metrics: MetricsConfig,
    pub inference: InferenceConfig,
    pub retrieval: RetrievalConfig,
    pub eval: EvalConfig,
    pub persistence: PersistenceConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub region: String,
    /// Shared secret for the dashboard. Unset means open.
    pub admin_token: Option<String>,
    /// How long the API layer may reuse a composed dashboard.
    pub dashboard_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            region: "local".to_string(),
            admin_token: None,
            dashboard_ttl_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Tokens granted per source per window.
    pub requests_per_window: u32,
    pub window_secs: u64,
    /// Aggregate ceiling per UTC calendar day.
    pub daily_budget: u64,
    /// When set, per-source and daily limits are bypassed.
    pub kill_switch: bool,
    /// Soft cap on user turns per client session.
    pub session_cap: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 10,
            window_secs: 60,
            daily_budget: 500,
            kill_switch: false,
            session_cap: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub max_input_chars: usize,
    pub max_messages: usize,
    pub max_message_chars: usize,
    pub max_conversation_chars: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 2000,
            max_messages: 20,
            max_message_chars: 2000,
            max_conversation_chars: 12_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub histogram_capacity: usize,
    pub bucket_secs: u64,
    /// Bucket count retained; 360 × 10 s is one hour.
    pub series_buckets: usize,
    pub event_capacity: usize,
    pub error_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            histogram_capacity: 2000,
            bucket_secs: 10,
            series_buckets: 360,
            event_capacity: 50,
            error_capacity: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the model gateway, e.g. `https://models.example.com`.
    pub base_url: Option<String>,
    pub path: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub system_prompt: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            path: "/v1/generate".to_string(),
            api_key: None,
            timeout_secs: 30,
            system_prompt: "You are a concise assistant answering questions about a software \
                            engineer's portfolio, projects, and professional experience. \
                            Answer only from the provided context. If the context does not \
                            contain the answer, say you don't know."
                .to_string(),
        }
    }
}

impl InferenceConfig {
    /// Both a base URL and a credential are needed to call the backend.
    pub fn is_configured(&self) -> bool {
        self.base_url.as_deref().is_some_and(|a| !a.is_empty())
            && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Context used whenever retrieval fails or is not wired.
    pub fallback_context: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fallback_context: "The portfolio covers backend engineering, cloud infrastructure, \
                               and applied machine learning projects."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// When set, callers must present it and get the privileged cap.
    pub secret: Option<String>,
    pub open_max_cases: usize,
    pub privileged_max_cases: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            secret: None,
            open_max_cases: 5,
            privileged_max_cases: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// redb file for session analytics. Unset disables persistence.
    pub path: Option<PathBuf>,
    /// Stored turns per session; oldest are dropped first.
    pub history_cap: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: None,
            history_cap: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub entries: Vec<CacheEntryConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let entry = |q: &str, a: &str| CacheEntryConfig {
            question: q.to_string(),
            answer: a.to_string(),
        };
        Self {
            entries: vec![
                entry(
                    "how can i contact you",
                    "The best way to get in touch is through the contact form or LinkedIn linked on this site.",
                ),
                entry(
                    "what is your tech stack",
                    "Day to day: Rust, Python, and TypeScript, deployed on Google Cloud with Terraform and Kubernetes.",
                ),
                entry(
                    "are you open to new opportunities",
                    "Yes, I'm open to senior backend and platform engineering roles. Use the contact form to reach out.",
                ),
                entry(
                    "where are you located",
                    "I'm based in Europe and work remotely across time zones.",
                ),
            ],
        }
    }
}

/// One pre-authored question/answer pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryConfig {
    pub question: String,
    pub answer: String,
}

impl TollgateConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TollgateConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TOLLGATE_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides through an arbitrary lookup (testable without
    /// touching the process environment).
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("TOLLGATE_INFERENCE_API_KEY") {
            self.inference.api_key = Some(key);
        }
        if let Some(secret) = lookup("TOLLGATE_EVAL_SECRET") {
            self.eval.secret = Some(secret);
        }
        if let Some(token) = lookup("TOLLGATE_ADMIN_TOKEN") {
            self.server.admin_token = Some(token);
        }
        if let Some(region) = lookup("TOLLGATE_REGION") {
            self.server.region = region;
        }
        if let Some(raw) = lookup("TOLLGATE_KILL_SWITCH") {
            self.admission.kill_switch = parse_flag("TOLLGATE_KILL_SWITCH", &raw)?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.admission.window_secs == 0 {
            return Err(invalid("admission.window_secs", "must be greater than zero"));
        }
        if self.metrics.bucket_secs == 0 {
            return Err(invalid("metrics.bucket_secs", "must be greater than zero"));
        }
        if self.metrics.series_buckets == 0 || self.metrics.histogram_capacity == 0 {
            return Err(invalid("metrics", "capacities must be greater than zero"));
        }
        if self.safety.max_messages == 0 {
            return Err(invalid("safety.max_messages", "must be greater than zero"));
        }
        if let Some(url) = self.inference.base_url.as_deref().filter(|u| !u.is_empty()) {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(invalid("inference.base_url", "must start with https:// or http://"));
            }
        }
        if self.inference.timeout_secs == 0 {
            return Err(invalid("inference.timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(invalid(key, &format!("expected a boolean, got {other:?}"))),
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
