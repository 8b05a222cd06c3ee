//! Per-key usage log used for rolling-hour rate limits

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::StoredKeyId;

/// Length of the sliding rate-limit window
pub const RATE_LIMIT_WINDOW_MINUTES: i64 = 60;

pub fn rate_limit_window() -> Duration {
    Duration::minutes(RATE_LIMIT_WINDOW_MINUTES)
}

/// Start of the sliding window ending at `now`.
///
/// Recomputed on every evaluation; entries strictly newer than this count.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - rate_limit_window()
}

/// True once `count` uses have reached the ceiling
pub fn exceeds_ceiling(count: u64, ceiling: u32) -> bool {
    count >= u64::from(ceiling)
}

/// One successful use of a stored key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub key_id: StoredKeyId,
    pub timestamp: DateTime<Utc>,
}

impl UsageLogEntry {
    pub fn new(key_id: StoredKeyId, timestamp: DateTime<Utc>) -> Self {
        Self { key_id, timestamp }
    }

    pub fn now(key_id: StoredKeyId) -> Self {
        Self::new(key_id, Utc::now())
    }

    pub fn is_within_window(&self, since: DateTime<Utc>) -> bool {
        self.timestamp > since
    }
}
