//! tollgate-safety — deterministic input screening in front of the model.
//!
//! Two entry points:
//!
//! - [`SafetyGate::sanitize`] screens one string: non-empty, length
//!   ceiling, invisible-character stripping, then the signature table.
//!   Any signature match yields the same generic refusal so a caller cannot
//!   learn which rule fired.
//! - [`validate_batch`] screens the shape of a whole conversation before
//!   the gate runs on individual messages.
//!
//! Detection is pattern based. Novel phrasing will get through; the
//! evaluation harness's security cases are where that gets noticed.

pub mod batch;
pub mod gate;
pub mod signatures;

pub use batch::{BatchLimits, BatchRejection, parse_batch, validate_batch};
pub use gate::{GateRejection, SafetyGate, strip_invisible};
pub use signatures::{SIGNATURES, ThreatCategory};
