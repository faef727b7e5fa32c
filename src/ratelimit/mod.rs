//! Rate limiting logic and state management.

mod backend;
mod clock;
mod counter;
mod keys;
mod limiter;
mod store;

pub use backend::{CounterStore, StoreError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::UsageRecord;
pub use keys::{normalize_key, KeyRegistry};
pub use limiter::{
    Decision, LimitConfig, Quota, RateLimitError, RateLimiter, DEFAULT_LIMIT, DEFAULT_WINDOW_SECS,
};
pub use store::{connect, MemoryCounterStore, StoreLocation, StoreOptions};
