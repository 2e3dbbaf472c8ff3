//! tollgate-state — optional session persistence for Tollgate.
//!
//! Backed by [redb](https://docs.rs/redb). Each chat request produces a
//! [`SessionUpdate`](tollgate_core::SessionUpdate) that is merged into a
//! per-session summary and appended to a capped message history.
//!
//! # Architecture
//!
//! Values are JSON-serialized into redb's `&[u8]` columns. Message keys are
//! `(session_id, seq)` tuples, so one session's history is a contiguous
//! range that no other id can fall into.
//!
//! `SessionStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and implements the engine's `SessionSink` port.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::SessionStore;
pub use types::*;
