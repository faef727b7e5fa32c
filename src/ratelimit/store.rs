//! In-process counter store with passive expiry.
//!
//! Records live in a sharded concurrent map. Expiry is replicated in two
//! ways: an increment that finds an elapsed record starts a fresh window in
//! the same locked operation, and a background sweeper drops records whose
//! window has elapsed. A `file://` store additionally keeps a JSON snapshot
//! of its records so counts survive a restart.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use super::backend::{CounterStore, StoreError};
use super::clock::Clock;
use super::counter::UsageRecord;

/// Where a counter store keeps its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Process memory only
    Memory,
    /// Process memory, snapshotted to a JSON file
    File(PathBuf),
}

impl StoreLocation {
    /// Parse a store connection url (`memory://` or `file://<path>`).
    pub fn parse(url: &str) -> Result<Self, StoreError> {
        let url = url.trim();
        if url == "memory" || url.starts_with("memory://") {
            return Ok(StoreLocation::Memory);
        }
        match url.strip_prefix("file://") {
            Some(path) if !path.is_empty() => Ok(StoreLocation::File(PathBuf::from(path))),
            _ => Err(StoreError::UnsupportedUrl(url.to_string())),
        }
    }
}

/// Options used when opening a counter store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Connection url
    pub url: String,
    /// Lifetime of a record after its window starts
    pub ttl_secs: u64,
    /// How many times to try opening the store
    pub reconnect_tries: u32,
    /// Pause between open attempts
    pub reconnect_interval: Duration,
}

/// Counter store holding usage records in memory.
pub struct MemoryCounterStore {
    records: DashMap<String, UsageRecord>,
    ttl_secs: u64,
    snapshot_path: Option<PathBuf>,
    ready: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl MemoryCounterStore {
    /// Create an empty, ready, volatile store.
    pub fn new(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            ttl_secs,
            snapshot_path: None,
            ready: AtomicBool::new(true),
            clock,
        }
    }

    /// Open a store at `location`, loading any live records from its snapshot.
    pub async fn open(
        location: &StoreLocation,
        ttl_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new(ttl_secs, clock);

        if let StoreLocation::File(path) = location {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let loaded = store.load_snapshot(path).await?;
            info!(path = %path.display(), records = loaded, "Loaded counter store snapshot");
            store.snapshot_path = Some(path.clone());
        }

        Ok(store)
    }

    async fn load_snapshot(&self, path: &Path) -> Result<usize, StoreError> {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        if contents.is_empty() {
            return Ok(0);
        }

        let records: Vec<UsageRecord> = serde_json::from_slice(&contents)?;
        let now = self.clock.now();
        for record in records {
            if !record.is_expired(now, self.ttl_secs) {
                self.records.insert(record.key.clone(), record);
            }
        }
        Ok(self.records.len())
    }

    /// Write the live records to the snapshot file, if this store has one.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let records: Vec<UsageRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let contents = serde_json::to_vec_pretty(&records)?;

        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        trace!(path = %path.display(), records = records.len(), "Persisted counter store snapshot");
        Ok(())
    }

    /// Drop every record whose window has elapsed. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.records.len();
        self.records
            .retain(|_, record| !record.is_expired(now, self.ttl_secs));
        before.saturating_sub(self.records.len())
    }

    /// Get a copy of the record for `key`.
    pub fn get(&self, key: &str) -> Option<UsageRecord> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mark the store as connected or disconnected.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Stop accepting operations and flush the snapshot.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.set_ready(false);
        self.persist().await
    }

    /// Spawn the background task that drops expired records.
    ///
    /// The task also refreshes the snapshot after each pass.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval = ?every, "Counter store sweeper started");

            loop {
                ticker.tick().await;

                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = store.len(), "Purged expired usage records");
                }

                if let Err(e) = store.persist().await {
                    warn!(error = %e, "Failed to persist counter store snapshot");
                }
            }
        })
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_or_create(
        &self,
        key: &str,
        window_secs: u64,
    ) -> Result<UsageRecord, StoreError> {
        if !self.is_ready() {
            return Err(StoreError::Closed);
        }

        let now = self.clock.now();

        // The entry guard holds the shard lock for the whole read-modify-write.
        let record = match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.is_expired(now, window_secs) {
                    trace!(key = %key, "Usage window elapsed, starting a new one");
                    *record = UsageRecord::new(key, now);
                } else {
                    record.increment();
                }
                record.clone()
            }
            Entry::Vacant(vacant) => {
                trace!(key = %key, "Creating usage record");
                vacant.insert(UsageRecord::new(key, now)).value().clone()
            }
        };

        Ok(record)
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Open the counter store described by `options`, retrying on failure.
///
/// An unsupported url fails immediately; anything else is retried up to
/// `reconnect_tries` times with `reconnect_interval` between attempts.
pub async fn connect(
    options: &StoreOptions,
    clock: Arc<dyn Clock>,
) -> Result<Arc<MemoryCounterStore>, StoreError> {
    let location = StoreLocation::parse(&options.url)?;
    let tries = options.reconnect_tries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match MemoryCounterStore::open(&location, options.ttl_secs, Arc::clone(&clock)).await {
            Ok(store) => {
                info!(url = %options.url, attempt, "Counter store opened");
                return Ok(Arc::new(store));
            }
            Err(e) if attempt < tries => {
                warn!(
                    url = %options.url,
                    attempt,
                    error = %e,
                    "Counter store unavailable, retrying"
                );
                tokio::time::sleep(options.reconnect_interval).await;
            }
            Err(e) => {
                error!(url = %options.url, attempts = attempt, error = %e, "Counter store open failed");
                return Err(StoreError::ConnectFailed {
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
        }
    }
}
