//! tollgate-health — on-demand health evaluation.
//!
//! A fixed set of named checks is evaluated from plain inputs and reduced
//! to one overall status by precedence:
//!
//! ```text
//! any check down      → unhealthy
//! else any degraded   → degraded
//! else                → healthy
//! ```
//!
//! Nothing is cached here; callers decide how long a report stays fresh.

pub mod checker;

pub use checker::{CheckResult, HealthInputs, HealthReport, evaluate, reduce};
