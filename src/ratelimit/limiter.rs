//! Core API-key rate limiter implementation.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

use super::backend::{CounterStore, StoreError};
use super::counter::UsageRecord;
use super::keys::{normalize_key, KeyRegistry};

/// Default number of calls allowed per window.
pub const DEFAULT_LIMIT: u64 = 5;
/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 3600;

/// Configuration for the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum calls allowed in one window
    pub limit: u64,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

/// Quota metadata reported with every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Calls allowed per window
    pub limit: u64,
    /// Calls left in the current window
    pub remaining: u64,
    /// Epoch second at which the window resets
    pub reset_at: i64,
}

/// Outcome of a rate limit check for a known caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The call is within quota
    Allow(Quota),
    /// The call is over quota
    Deny(Quota),
}

impl Decision {
    pub fn quota(&self) -> &Quota {
        match self {
            Decision::Allow(quota) | Decision::Deny(quota) => quota,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Reasons a rate limit check could not produce a decision.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Missing or unregistered caller key
    #[error("API key required")]
    Unauthorized,
    /// The counter store is not ready
    #[error("counter store is not ready")]
    ServiceUnavailable,
    /// The counter store failed while counting
    #[error("counter store failed: {0}")]
    Internal(#[from] StoreError),
}

/// The rate limiter that decides whether a caller may proceed.
///
/// Holds no counters itself; all state lives in the shared counter store,
/// which orders concurrent increments for the same key.
pub struct RateLimiter {
    config: LimitConfig,
    registry: KeyRegistry,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Create a rate limiter over the given key registry and counter store.
    pub fn new(config: LimitConfig, registry: KeyRegistry, store: Arc<dyn CounterStore>) -> Self {
        Self {
            config,
            registry,
            store,
        }
    }

    pub fn config(&self) -> LimitConfig {
        self.config
    }

    /// Count a call for `caller_key` and decide whether it is allowed.
    ///
    /// Unknown keys are rejected before the store is touched. If the caller
    /// is cancelled while the store call is in flight, the increment may
    /// still be applied.
    pub async fn check(&self, caller_key: Option<&str>) -> Result<Decision, RateLimitError> {
        let key = caller_key.map(normalize_key).unwrap_or_default();

        if !self.registry.is_valid_key(&key) {
            trace!("Rejecting call without a registered API key");
            return Err(RateLimitError::Unauthorized);
        }

        if !self.store.is_ready() {
            debug!(key = %key, "Counter store not ready");
            return Err(RateLimitError::ServiceUnavailable);
        }

        let record = self
            .store
            .increment_or_create(&key, self.config.window_secs)
            .await?;

        Ok(self.decide(&record))
    }

    fn decide(&self, record: &UsageRecord) -> Decision {
        let limit = self.config.limit;
        let count = record.usage_count;
        let quota = Quota {
            limit,
            remaining: limit.saturating_sub(count),
            reset_at: record.reset_at_epoch_secs(self.config.window_secs),
        };

        trace!(
            key = %record.key,
            count,
            remaining = quota.remaining,
            reset_at = quota.reset_at,
            "Checked rate limit"
        );

        if count > limit {
            debug!(key = %record.key, count, limit, "Rate limit exceeded");
            Decision::Deny(quota)
        } else {
            Decision::Allow(quota)
        }
    }
}
