//! Test doubles shared by the engine's unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tollgate_core::config::TollgateConfig;
use tollgate_core::{
    BoxFuture, Inference, InferenceRequest, ManualClock, SessionSink, SessionUpdate, UpstreamError,
};

use crate::{Engine, EngineParts, SessionPersistence};

// 2025-03-01T12:00:00Z
pub const NOON: u64 = 1_740_830_400_000;

/// Replies from a script, then echoes the last user turn.
#[derive(Default)]
pub struct StubInference {
    script: Mutex<VecDeque<Result<String, UpstreamError>>>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<InferenceRequest>>,
}

impl StubInference {
    pub fn failing_once(error: UpstreamError) -> Self {
        let stub = Self::default();
        stub.script.lock().push_back(Err(error));
        stub
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Inference for StubInference {
    fn is_configured(&self) -> bool {
        true
    }

    fn generate(&self, request: InferenceRequest) -> BoxFuture<'_, Result<String, UpstreamError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().pop_front();
        let echo = request
            .messages
            .last()
            .map(|m| format!("echo: {}", m.content))
            .unwrap_or_default();
        *self.last_request.lock() = Some(request);
        Box::pin(async move { scripted.unwrap_or(Ok(echo)) })
    }
}

/// Keeps every update in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<SessionUpdate>>,
}

impl SessionSink for RecordingSink {
    fn record(&self, update: &SessionUpdate) -> anyhow::Result<()> {
        self.updates.lock().push(update.clone());
        Ok(())
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub inference: Arc<StubInference>,
    pub sink: Arc<RecordingSink>,
    pub engine: Engine,
}

pub fn harness_with(mut config: TollgateConfig, inference: StubInference) -> Harness {
    config.inference.base_url = Some("http://127.0.0.1:9".to_string());
    config.inference.api_key = Some("test".to_string());
    let clock = Arc::new(ManualClock::new(NOON));
    let inference = Arc::new(inference);
    let sink = Arc::new(RecordingSink::default());
    let engine = Engine::new(
        config,
        EngineParts {
            clock: clock.clone(),
            inference: inference.clone(),
            retrieval: None,
            sessions: SessionPersistence::Enabled(sink.clone()),
        },
    )
    .unwrap();
    Harness {
        clock,
        inference,
        sink,
        engine,
    }
}

pub fn harness() -> Harness {
    harness_with(TollgateConfig::default(), StubInference::default())
}
