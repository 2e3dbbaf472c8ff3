//! Client-side session cap.
//!
//! A best-effort soft limit on user turns per conversation. The count comes
//! from the client, so this throttles the UI rather than protecting the
//! service; the token buckets and daily budget do that.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionCounter {
    pub count: u32,
    pub cap: u32,
}

impl SessionCounter {
    pub fn new(cap: u32) -> Self {
        Self { count: 0, cap }
    }

    /// Resume from a count reported by the client.
    pub fn from_count(count: u32, cap: u32) -> Self {
        Self { count, cap }
    }

    /// Count one turn. Returns false once the cap has been passed.
    pub fn record(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count <= self.cap
    }

    pub fn is_capped(&self) -> bool {
        self.count >= self.cap
    }

    pub fn remaining(&self) -> u32 {
        self.cap.saturating_sub(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_after_limit() {
        let mut s = SessionCounter::new(2);
        assert!(s.record());
        assert!(!s.is_capped());
        assert!(s.record());
        assert!(s.is_capped());
        assert!(!s.record());
        assert_eq!(s.remaining(), 0);
    }

    #[test]
    fn resumes_from_client_count() {
        let s = SessionCounter::from_count(5, 30);
        assert_eq!(s.remaining(), 25);
        assert!(!s.is_capped());
    }
}
