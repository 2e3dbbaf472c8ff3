//! Metric names recorded by the engine.

pub const CHAT_REQUESTS: &str = "chat.requests";
pub const CHAT_ANSWERED: &str = "chat.answered";
pub const CHAT_CACHE_HITS: &str = "chat.cache_hits";
pub const CHAT_RATE_LIMITED: &str = "chat.rate_limited";
pub const CHAT_BUDGET_EXHAUSTED: &str = "chat.budget_exhausted";
pub const CHAT_SAFETY_BLOCKED: &str = "chat.safety_blocked";
pub const CHAT_INVALID: &str = "chat.invalid";
pub const CHAT_UPSTREAM_FAILURES: &str = "chat.upstream_failures";
pub const CHAT_ERRORS: &str = "chat.errors";
pub const SESSION_WRITE_FAILURES: &str = "session.write_failures";
pub const EVAL_RUNS: &str = "eval.runs";

/// End-to-end chat latency in milliseconds.
pub const CHAT_LATENCY_MS: &str = "chat.latency_ms";
/// Time spent in the inference call alone.
pub const INFERENCE_LATENCY_MS: &str = "inference.latency_ms";

pub const GAUGE_DAILY_BUDGET_REMAINING: &str = "admission.daily_budget_remaining";
pub const GAUGE_LAST_EVAL_PASS_RATE: &str = "eval.last_pass_rate";
