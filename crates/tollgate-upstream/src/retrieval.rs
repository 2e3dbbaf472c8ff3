//! Retrieval with a static fallback.

use std::sync::Arc;

use tollgate_core::Retrieval;
use tracing::{debug, warn};

/// Context source that never fails.
#[derive(Clone)]
pub struct Retriever {
    backend: Option<Arc<dyn Retrieval>>,
    fallback: String,
}

impl Retriever {
    pub fn new(backend: Option<Arc<dyn Retrieval>>, fallback: impl Into<String>) -> Self {
        Self {
            backend,
            fallback: fallback.into(),
        }
    }

    /// A retriever that only ever returns the fallback text.
    pub fn fallback_only(fallback: impl Into<String>) -> Self {
        Self::new(None, fallback)
    }

    /// The system instruction sent upstream: `base_prompt` followed by the
    /// context retrieved for `query`.
    pub async fn system_instruction(&self, base_prompt: &str, query: &str) -> String {
        let context = self.context(query).await;
        format!("{base_prompt}\n\nContext:\n{context}")
    }

    pub async fn context(&self, query: &str) -> String {
        let Some(backend) = &self.backend else {
            return self.fallback.clone();
        };
        match backend.retrieve(query).await {
            Ok(context) if !context.trim().is_empty() => context,
            Ok(_) => {
                debug!("retrieval returned nothing, using fallback context");
                self.fallback.clone()
            }
            Err(e) => {
                warn!(error = %e, "retrieval failed, using fallback context");
                self.fallback.clone()
            }
        }
    }
}
