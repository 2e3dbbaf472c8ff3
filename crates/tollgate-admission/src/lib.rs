//! tollgate-admission — decides whether a request may proceed before any
//! expensive work starts.
//!
//! # Evaluation order
//!
//! ```text
//! AdmissionController::admit(source, query)
//!   1. kill switch        → bypass 2 and 3 when set
//!   2. RateLimiter        → fixed window, hard reset, per source
//!   3. DailyBudget        → one counter per UTC calendar day
//!   4. ResponseCache      → exact, then substring match; short-circuits
//! SessionCounter          → client-side soft cap, advisory only
//! ```
//!
//! The hard window reset is deliberate: the goal is "never more than N per
//! rough minute" for cost control, so two adjacent windows can admit up to
//! 2N requests in a burst.

pub mod budget;
pub mod cache;
pub mod controller;
pub mod limiter;
pub mod session;

pub use budget::{BudgetDecision, DailyBudget};
pub use cache::ResponseCache;
pub use controller::{Admission, AdmissionCheck, AdmissionController, RejectReason};
pub use limiter::{RateDecision, RateLimiter};
pub use session::SessionCounter;
