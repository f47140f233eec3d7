//! Atomic counters with expiry.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::store::StoreError;

/// Atomic-increment-with-expiry counter store shared by every handler.
///
/// Each method is atomic per key; sequences of calls are not.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` (creating it at 0 if absent or expired) and return the new value.
    async fn incr(&self, key: &str) -> Result<u64, StoreError>;

    /// Set `key` to expire `ttl` from now.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remaining time-to-live, or `None` if the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Minimum spacing between sweeps of expired counters.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Process-local counter store.
///
/// Expired counters are reset on the next touch, and `incr` drops every
/// expired counter at most once per [`SWEEP_INTERVAL`].
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<String, Counter>,
    last_sweep: Mutex<Option<Instant>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired counter.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.counters.retain(|_, c| !c.is_expired(now));
    }

    fn sweep_if_due(&self, now: Instant) {
        let due = match self.last_sweep.lock() {
            Ok(mut last) => match *last {
                Some(at) if now.duration_since(at) < SWEEP_INTERVAL => false,
                Some(_) => {
                    *last = Some(now);
                    true
                }
                None => {
                    *last = Some(now);
                    false
                }
            },
            Err(_) => false,
        };
        if due {
            let before = self.counters.len();
            self.counters.retain(|_, c| !c.is_expired(now));
            tracing::debug!(
                dropped = before.saturating_sub(self.counters.len()),
                "Swept expired rate limit counters"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        // Must run before `entry` takes a shard lock.
        self.sweep_if_due(now);
        let mut entry = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: None,
        });
        if entry.is_expired(now) {
            *entry = Counter {
                count: 0,
                expires_at: None,
            };
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        if let Some(mut entry) = self.counters.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        Ok(self.counters.get(key).and_then(|c| match c.expires_at {
            Some(at) if at > now => Some(at - now),
            _ => None,
        }))
    }
}
