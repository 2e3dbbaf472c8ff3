//! tollgate-upstream — clients for the collaborators the engine calls out to.
//!
//! `HttpInference` speaks a small JSON protocol over HTTPS (reqwest with
//! rustls) to a model gateway. `Retriever` wraps an optional retrieval backend and always
//! yields some context, falling back to configured static text.

pub mod inference;
pub mod retrieval;

pub use inference::HttpInference;
pub use retrieval::Retriever;
