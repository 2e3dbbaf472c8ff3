//! Bounded event and error logs.
//!
//! Two independent FIFO rings of discrete happenings. Reads come back
//! newest first; there is no deduplication or severity filtering.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tollgate_core::Clock;
use tollgate_core::clock::iso8601;

use crate::bounded::BoundedPush;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentError {
    pub timestamp: String,
    pub endpoint: String,
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

struct Ring<T> {
    capacity: usize,
    entries: Mutex<VecDeque<T>>,
}

impl<T: Clone> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, value: T) {
        self.entries.lock().push_bounded(value, self.capacity);
    }

    fn newest_first(&self) -> Vec<T> {
        self.entries.lock().iter().rev().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Capped log of notable happenings (cache hits, rate limits, blocks...).
pub struct EventLog {
    clock: Arc<dyn Clock>,
    ring: Ring<Event>,
}

impl EventLog {
    pub fn new(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            clock,
            ring: Ring::new(capacity),
        }
    }

    pub fn add_event(&self, kind: &str, message: impl Into<String>) {
        self.ring.push(Event {
            timestamp: iso8601(self.clock.now_ms()),
            kind: kind.to_string(),
            message: message.into(),
        });
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<Event> {
        self.ring.newest_first()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Capped log of failed requests.
pub struct ErrorLog {
    clock: Arc<dyn Clock>,
    ring: Ring<RecentError>,
}

impl ErrorLog {
    pub fn new(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            clock,
            ring: Ring::new(capacity),
        }
    }

    pub fn record_error(
        &self,
        endpoint: &str,
        status_code: u16,
        message: impl Into<String>,
        trace_id: Option<&str>,
    ) {
        self.ring.push(RecentError {
            timestamp: iso8601(self.clock.now_ms()),
            endpoint: endpoint.to_string(),
            status_code,
            message: message.into(),
            trace_id: trace_id.map(str::to_string),
        });
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<RecentError> {
        self.ring.newest_first()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
