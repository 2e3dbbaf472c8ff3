//! Optional session persistence.

use std::sync::Arc;

use regex::Regex;
use tollgate_core::{ChatMessage, Role, SessionSink, SessionUpdate};
use tracing::warn;

/// Whether a session sink is wired. Absence is a normal state.
#[derive(Clone, Default)]
pub enum SessionPersistence {
    #[default]
    Disabled,
    Enabled(Arc<dyn SessionSink>),
}

impl SessionPersistence {
    pub fn is_enabled(&self) -> bool {
        matches!(self, SessionPersistence::Enabled(_))
    }

    /// Hand the update to the sink. Returns false if the write failed.
    pub(crate) fn record(&self, update: &SessionUpdate) -> bool {
        let SessionPersistence::Enabled(sink) = self else {
            return true;
        };
        match sink.record(update) {
            Ok(()) => true,
            Err(e) => {
                warn!(session = %update.session_id, error = %e, "session write failed");
                false
            }
        }
    }
}

const MAX_SESSION_ID_CHARS: usize = 128;

/// Session ids are opaque client tokens: ASCII letters, digits, `-` and `_`.
pub(crate) fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_CHARS
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub(crate) const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";

/// First email address found in the user turns.
pub(crate) fn capture_email(pattern: &Regex, messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .filter(|m| m.role == Role::User)
        .find_map(|m| pattern.find(&m.content))
        .map(|m| m.as_str().to_string())
}
