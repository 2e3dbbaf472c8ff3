//! redb table definitions.

use redb::TableDefinition;

/// Session summaries keyed by `{session_id}`.
pub const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Message history keyed by `(session_id, seq)`.
pub const MESSAGES: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("messages");
