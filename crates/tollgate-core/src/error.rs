//! Error taxonomy for the engine and its configuration.

use thiserror::Error;

/// Fixed refusal shown for any safety-gate match. It never names the rule
/// that fired.
pub const SAFETY_REFUSAL: &str =
    "I can't help with that request. Please ask a question about the portfolio, projects, or experience.";

/// Fixed message shown when the upstream model fails or times out.
pub const UPSTREAM_RETRY: &str =
    "The assistant is temporarily unavailable. Please try again in a moment.";

/// Every expected failure of a request, as seen by a caller.
///
/// `Display` is the user-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Malformed or oversized input. The message is specific and actionable.
    #[error("{0}")]
    Validation(String),

    /// A threat signature matched.
    #[error("{}", SAFETY_REFUSAL)]
    SafetyRejection,

    /// Rate or budget exceeded.
    #[error("{message}")]
    Admission {
        message: String,
        remaining: u32,
        reset_at_ms: u64,
    },

    /// Inference or retrieval failed. The raw cause is never carried.
    #[error("{}", UPSTREAM_RETRY)]
    Upstream,

    /// A required external credential is missing.
    #[error("service unavailable: {0}")]
    Configuration(String),
}

impl EngineError {
    /// Short machine-readable tag for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::SafetyRejection => "safety",
            EngineError::Admission { .. } => "admission",
            EngineError::Upstream => "upstream",
            EngineError::Configuration(_) => "configuration",
        }
    }
}

/// Errors raised while loading `tollgate.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}
