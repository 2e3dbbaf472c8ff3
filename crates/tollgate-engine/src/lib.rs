//! tollgate-engine — the single owned handle in front of the model.
//!
//! One `Engine` is built at process start and shared as `Arc<Engine>`;
//! tests build a fresh one each. It owns every piece of mutable state and
//! is the only thing request handlers talk to.
//!
//! # Chat pipeline
//!
//! ```text
//! chat(request)
//!   ├── validate batch            → Validation
//!   ├── admit(source, query)      → Admission | cache hit (gate skipped)
//!   ├── safety gate per user turn → SafetyRejection | Validation
//!   ├── retrieval context         (never fails)
//!   ├── inference                 → Upstream | Configuration
//!   ├── metrics + time series
//!   └── session persistence       (failures logged, never surfaced)
//! ```

mod chat;
mod engine;
mod persistence;

#[cfg(test)]
mod testing;

pub use chat::{ChatReply, ChatRequest, SessionStatus};
pub use engine::{Engine, EngineParts};
pub use persistence::SessionPersistence;
