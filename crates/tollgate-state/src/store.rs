//! SessionStore — redb-backed session persistence.
//!
//! Summaries live in one table, history in another. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tollgate_core::{ChatMessage, SessionSink, SessionUpdate};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

#[derive(Clone)]
pub struct SessionStore {
    db: Arc<Database>,
    history_cap: usize,
}

impl SessionStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path, history_cap: usize) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            history_cap,
        };
        store.ensure_tables()?;
        debug!(?path, history_cap, "session store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory(history_cap: usize) -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            history_cap,
        };
        store.ensure_tables()?;
        debug!("in-memory session store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(SESSIONS).map_err(map_err!(Table))?;
        txn.open_table(MESSAGES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Sessions ───────────────────────────────────────────────────

    pub fn put_session(&self, record: &SessionRecord) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        write_session(&txn, record)?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    pub fn get_session(&self, session_id: &str) -> StateResult<Option<SessionRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SESSIONS).map_err(map_err!(Table))?;
        match table.get(session_id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode_record(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_sessions(&self) -> StateResult<Vec<SessionRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SESSIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode_record(value.value())?);
        }
        Ok(results)
    }

    /// Merge one request's update into the session summary and append its
    /// turns to the history, in a single transaction.
    ///
    /// The previous summary is read inside the write transaction, so
    /// concurrent updates to one session serialize instead of overwriting
    /// each other.
    pub fn apply(&self, update: &SessionUpdate) -> StateResult<SessionRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record = {
            let mut table = txn.open_table(SESSIONS).map_err(map_err!(Table))?;
            let previous = match table.get(update.session_id.as_str()).map_err(map_err!(Read))? {
                Some(guard) => Some(decode_record(guard.value())?),
                None => None,
            };
            let record = merge(previous, update);
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(record.session_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            record
        };
        append(&txn, &update.session_id, &update.messages, update.at_ms, self.history_cap)?;
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(
            session = %record.session_id,
            status = ?record.status,
            engagement = record.engagement_score,
            "session updated"
        );
        Ok(record)
    }

    // ── Messages ───────────────────────────────────────────────────

    /// Append turns to a session's history, dropping the oldest past the cap.
    pub fn append_messages(&self, session_id: &str, messages: &[ChatMessage], at_ms: u64) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        append(&txn, session_id, messages, at_ms, self.history_cap)?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// A session's stored history, oldest first.
    pub fn list_messages(&self, session_id: &str) -> StateResult<Vec<StoredMessage>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MESSAGES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.range(history_range(session_id)).map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let message: StoredMessage =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(message);
        }
        Ok(results)
    }
}

impl SessionSink for SessionStore {
    fn record(&self, update: &SessionUpdate) -> anyhow::Result<()> {
        self.apply(update)?;
        Ok(())
    }
}

fn merge(previous: Option<SessionRecord>, update: &SessionUpdate) -> SessionRecord {
    let mut record = previous.unwrap_or_else(|| SessionRecord {
        session_id: update.session_id.clone(),
        message_count: 0,
        user_turns: 0,
        cache_hits: 0,
        rate_limited: false,
        status: update.status,
        engagement_score: 0,
        email: None,
        created_at: update.at_ms,
        updated_at: update.at_ms,
    });

    record.message_count = record
        .message_count
        .saturating_add(update.messages.len() as u32);
    record.user_turns = record.user_turns.max(update.user_turns);
    if update.cache_hit {
        record.cache_hits = record.cache_hits.saturating_add(1);
    }
    record.rate_limited |= update.rate_limited;
    record.status = update.status;
    if update.email.is_some() {
        record.email = update.email.clone();
    }
    record.engagement_score = engagement_score(record.user_turns, record.email.is_some());
    record.updated_at = update.at_ms;
    record
}

fn decode_record(bytes: &[u8]) -> StateResult<SessionRecord> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

fn write_session(txn: &WriteTransaction, record: &SessionRecord) -> StateResult<()> {
    let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
    let mut table = txn.open_table(SESSIONS).map_err(map_err!(Table))?;
    table
        .insert(record.session_id.as_str(), value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

fn append(
    txn: &WriteTransaction,
    session_id: &str,
    messages: &[ChatMessage],
    at_ms: u64,
    history_cap: usize,
) -> StateResult<()> {
    if messages.is_empty() {
        return Ok(());
    }
    let mut table = txn.open_table(MESSAGES).map_err(map_err!(Table))?;

    // Existing sequence numbers for this session, oldest first.
    let mut seqs: Vec<u64> = Vec::new();
    for entry in table.range(history_range(session_id)).map_err(map_err!(Read))? {
        let (key, _) = entry.map_err(map_err!(Read))?;
        seqs.push(key.value().1);
    }
    let next_seq = seqs.last().map_or(0, |last| last + 1);

    for (offset, message) in messages.iter().enumerate() {
        let stored = StoredMessage {
            session_id: session_id.to_string(),
            seq: next_seq + offset as u64,
            role: message.role,
            content: message.content.clone(),
            at_ms,
        };
        let value = serde_json::to_vec(&stored).map_err(map_err!(Serialize))?;
        table
            .insert(stored.table_key(), value.as_slice())
            .map_err(map_err!(Write))?;
        seqs.push(stored.seq);
    }

    let excess = seqs.len().saturating_sub(history_cap);
    for seq in &seqs[..excess] {
        table.remove((session_id, *seq)).map_err(map_err!(Write))?;
    }
    if excess > 0 {
        debug!(session = %session_id, dropped = excess, "history capped");
    }
    Ok(())
}

/// Key range covering every message of exactly one session.
fn history_range(session_id: &str) -> RangeInclusive<(&str, u64)> {
    (session_id, 0)..=(session_id, u64::MAX)
}
