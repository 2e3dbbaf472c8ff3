//! tollgate-core — shared vocabulary for the Tollgate engine.
//!
//! Holds the types every other crate speaks in: chat messages and roles,
//! safety verdicts, the engine error taxonomy, the wall clock abstraction,
//! the ports for external collaborators (inference, retrieval, session
//! persistence), and the `tollgate.toml` configuration model.

pub mod clock;
pub mod config;
pub mod error;
pub mod ports;
pub mod secret;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TollgateConfig;
pub use error::{ConfigError, EngineError};
pub use ports::{
    BoxFuture, Inference, InferenceRequest, Retrieval, SessionSink, SessionUpdate, UpstreamError,
};
pub use secret::secret_matches;
pub use types::*;
