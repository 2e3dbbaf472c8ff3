//! tollgate-eval — end-to-end evaluation of the gate and the model.
//!
//! # Architecture
//!
//! ```text
//! CASES (versioned table)
//!   └── EvalHarness::run(selection, access)
//!         ├── SafetyGate::inspect(prompt)
//!         │     ├── rejected → refusal text is the response
//!         │     └── clean    → Retriever::system_instruction()
//!         │                    → Inference::generate()
//!         ├── CompiledCase::score(response)
//!         │     └── all required match, no forbidden match
//!         └── EvalSummary (pass rate, avg latency)
//! ```
//!
//! Access is tiered: with a shared secret configured, only callers that
//! present it may run, and they get the higher case cap. Without one the
//! harness is open at the lower cap.

pub mod cases;
pub mod harness;
pub mod scoring;

pub use cases::{CASES, EvalCase, EvalCategory, SUITE_VERSION, find_case};
pub use harness::{
    EvalAccess, EvalError, EvalHarness, EvalReport, EvalResult, EvalSelection, EvalSummary,
    authorize,
};
pub use scoring::{CheckKind, CheckOutcome, CompiledCase, Score};
