//! Short-lived cache for the composed dashboard.
//!
//! Composition walks every histogram and log; a dashboard polled by several
//! viewers reuses one snapshot until it is older than the TTL.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tollgate_dashboard::DashboardSnapshot;
use tracing::debug;

struct Entry {
    composed_at_ms: u64,
    snapshot: Arc<DashboardSnapshot>,
}

pub struct DashboardCache {
    ttl_ms: u64,
    slot: Mutex<Option<Entry>>,
}

impl DashboardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as u64,
            slot: Mutex::new(None),
        }
    }

    /// The cached snapshot if it is fresh at `now_ms`, otherwise a new one.
    pub fn get_or_compose<F>(&self, now_ms: u64, compose: F) -> Arc<DashboardSnapshot>
    where
        F: FnOnce() -> DashboardSnapshot,
    {
        let mut slot = self.slot.lock();
        let fresh = slot
            .as_ref()
            .filter(|e| now_ms.saturating_sub(e.composed_at_ms) < self.ttl_ms);
        if let Some(entry) = fresh {
            return entry.snapshot.clone();
        }

        let snapshot = Arc::new(compose());
        debug!(ttl_ms = self.ttl_ms, "dashboard recomposed");
        *slot = Some(Entry {
            composed_at_ms: now_ms,
            snapshot: snapshot.clone(),
        });
        snapshot
    }
}
