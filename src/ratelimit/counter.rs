//! Usage record kept per caller key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage of a single caller key within its current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Lowercased caller key
    pub key: String,
    /// When the first request of the current window was counted
    pub last_used_at: DateTime<Utc>,
    /// Number of requests counted in the current window
    pub usage_count: u64,
}

impl UsageRecord {
    /// Start a new window for `key` at `now`.
    pub fn new(key: &str, now: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            last_used_at: now,
            usage_count: 1,
        }
    }

    /// Count one more request in the current window.
    pub fn increment(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
    }

    /// When this record stops being live, or `None` if it never does.
    ///
    /// Falls on the whole second reported by [`Self::reset_at_epoch_secs`].
    pub fn expires_at(&self, window_secs: u64) -> Option<DateTime<Utc>> {
        let window = i64::try_from(window_secs).ok()?;
        let secs = self.last_used_at.timestamp().checked_add(window)?;
        DateTime::from_timestamp(secs, 0)
    }

    /// Whether the window of this record has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, window_secs: u64) -> bool {
        self.expires_at(window_secs)
            .is_some_and(|expires_at| now >= expires_at)
    }

    /// Epoch second at which the window resets.
    pub fn reset_at_epoch_secs(&self, window_secs: u64) -> i64 {
        let window = i64::try_from(window_secs).unwrap_or(i64::MAX);
        self.last_used_at.timestamp().saturating_add(window)
    }
}
