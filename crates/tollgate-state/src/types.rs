//! Persisted session types.

use serde::{Deserialize, Serialize};
use tollgate_core::{RequestStatus, Role};

const SCORE_PER_TURN: u32 = 10;
const SCORE_EMAIL_BONUS: u32 = 20;
const SCORE_MAX: u32 = 100;

/// Analytics summary for one client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    /// Messages stored through this server, before history capping.
    pub message_count: u32,
    /// Highest user-turn count seen for the conversation.
    pub user_turns: u32,
    pub cache_hits: u32,
    /// Set once any request in the session was rate limited.
    pub rate_limited: bool,
    pub status: RequestStatus,
    pub engagement_score: u32,
    pub email: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// One turn of stored history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub session_id: String,
    pub seq: u64,
    pub role: Role,
    pub content: String,
    pub at_ms: u64,
}

impl StoredMessage {
    pub fn table_key(&self) -> (&str, u64) {
        (self.session_id.as_str(), self.seq)
    }
}

/// 10 points per user turn, 20 for a captured email, capped at 100.
pub fn engagement_score(user_turns: u32, has_email: bool) -> u32 {
    let bonus = if has_email { SCORE_EMAIL_BONUS } else { 0 };
    user_turns
        .saturating_mul(SCORE_PER_TURN)
        .saturating_add(bonus)
        .min(SCORE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_scoring() {
        assert_eq!(engagement_score(0, false), 0);
        assert_eq!(engagement_score(3, false), 30);
        assert_eq!(engagement_score(3, true), 50);
        assert_eq!(engagement_score(9, true), 100);
        assert_eq!(engagement_score(u32::MAX, true), 100);
    }
}
