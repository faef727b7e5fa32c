//! Counter store trait for abstracting where usage records live.

use async_trait::async_trait;
use thiserror::Error;

use super::counter::UsageRecord;

/// Errors raised by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported counter store url: {0}")]
    UnsupportedUrl(String),
    #[error("counter store is closed")]
    Closed,
    #[error("counter store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("counter store snapshot is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to open counter store after {attempts} attempts: {source}")]
    ConnectFailed {
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },
}

/// Trait for counter store implementations.
///
/// A store owns the set of usage records and their expiry. The rate limiter
/// only ever asks it to count a request; it never deletes records itself.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request for `key` and return the post-increment record.
    ///
    /// Must be atomic per key: the record is created with a count of one
    /// when absent (or when its `window_secs` window has elapsed), otherwise
    /// its count is incremented. `last_used_at` is left untouched on
    /// increment so it keeps anchoring the current window.
    async fn increment_or_create(
        &self,
        key: &str,
        window_secs: u64,
    ) -> Result<UsageRecord, StoreError>;

    /// Whether the store is connected and accepting operations.
    fn is_ready(&self) -> bool;
}
