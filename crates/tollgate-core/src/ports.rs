//! Ports for the external collaborators the engine consumes.
//!
//! The engine never implements inference, retrieval, or storage itself; it
//! talks to them through these traits so tests can substitute stubs and a
//! missing collaborator is a normal, configured-off state.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ChatMessage, RequestStatus};

/// Boxed, sendable future returned by the async ports.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure of an external call. Logged, never shown to callers.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream not configured")]
    NotConfigured,

    #[error("upstream timed out after {0} ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("malformed upstream response: {0}")]
    Decode(String),
}

/// One call to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

/// Text generation backend.
pub trait Inference: Send + Sync {
    /// Whether the credentials needed to call the backend are present.
    fn is_configured(&self) -> bool;

    fn generate(&self, request: InferenceRequest) -> BoxFuture<'_, Result<String, UpstreamError>>;
}

/// Context lookup for a user query.
pub trait Retrieval: Send + Sync {
    fn retrieve<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<String, UpstreamError>>;
}

/// Analytics delta produced by one chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub session_id: String,
    pub status: RequestStatus,
    pub cache_hit: bool,
    pub rate_limited: bool,
    /// User turns in the conversation as submitted.
    pub user_turns: u32,
    /// Email address found in the conversation, if any.
    pub email: Option<String>,
    /// Turns to append to the stored history (latest user turn + reply).
    pub messages: Vec<ChatMessage>,
    pub at_ms: u64,
}

/// Session and analytics persistence.
pub trait SessionSink: Send + Sync {
    fn record(&self, update: &SessionUpdate) -> anyhow::Result<()>;
}
