//! Distributed fixed-window rate limiting.
//!
//! # Algorithm
//! ```text
//! count = INCR key
//! count == 1     → EXPIRE key window      (first hit opens the window)
//! count >  limit → limited, retry after TTL(key)
//! otherwise      → allowed
//! ```
//!
//! # Design Decisions
//! - O(1) state per key; up to 2×limit may pass across a window edge
//! - Fail open: a counter store outage admits traffic and logs a warning
//! - A limited key without an expiry gets one, so a lost EXPIRE cannot pin it shut

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::WindowLimit;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::store::{CounterStore, StoreError};

/// Identity a counter is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    /// Client network address.
    Ip,
    /// Normalized email (stored hashed).
    Email,
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::Ip => "ip",
            LimitScope::Email => "email",
        }
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limited: bool,
    /// Time until the window resets; zero when not limited.
    pub retry_after: Duration,
}

impl RateLimitDecision {
    fn allowed() -> Self {
        Self {
            limited: false,
            retry_after: Duration::ZERO,
        }
    }
}

/// Counter key for a scope and identity.
pub fn scoped_key(scope: LimitScope, identity: &str) -> String {
    format!("ratelimit:{}:{}", scope.as_str(), identity)
}

/// Fixed-window limiter over a shared counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    call_timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, call_timeout: Duration) -> Self {
        Self {
            store,
            call_timeout,
        }
    }

    /// Check and consume one slot for `key`.
    pub async fn check(&self, key: &str, limit: u64, window: Duration) -> RateLimitDecision {
        self.check_labelled("custom", key, limit, window).await
    }

    /// Check and consume one slot for `identity` under `scope`.
    pub async fn check_scope(
        &self,
        scope: LimitScope,
        identity: &str,
        limit: &WindowLimit,
    ) -> RateLimitDecision {
        let key = scoped_key(scope, identity);
        let decision = self
            .check_labelled(
                scope.as_str(),
                &key,
                limit.limit,
                Duration::from_secs(limit.window_secs),
            )
            .await;
        if decision.limited {
            metrics::record_rate_limited(scope.as_str());
            tracing::warn!(
                scope = %scope,
                retry_after_secs = decision.retry_after.as_secs(),
                "Rate limit exceeded"
            );
        }
        decision
    }

    async fn check_labelled(
        &self,
        label: &'static str,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> RateLimitDecision {
        match self.try_check(key, limit, window).await {
            Ok(decision) => decision,
            Err(e) => {
                metrics::record_rate_limiter_fail_open(label);
                tracing::warn!(scope = label, error = %e, "Rate limiter store unavailable; failing open");
                RateLimitDecision::allowed()
            }
        }
    }

    async fn try_check(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<RateLimitDecision, StoreError> {
        let count = with_deadline("counter.incr", self.call_timeout, self.store.incr(key)).await?;
        if count == 1 {
            with_deadline(
                "counter.expire",
                self.call_timeout,
                self.store.expire(key, window),
            )
            .await?;
        }

        if count <= limit {
            return Ok(RateLimitDecision::allowed());
        }

        let ttl = with_deadline("counter.ttl", self.call_timeout, self.store.ttl(key)).await?;
        let retry_after = match ttl {
            Some(ttl) => ttl,
            None => {
                with_deadline(
                    "counter.expire",
                    self.call_timeout,
                    self.store.expire(key, window),
                )
                .await?;
                window
            }
        };
        Ok(RateLimitDecision {
            limited: true,
            retry_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCounterStore;
    use async_trait::async_trait;

    struct DownStore;

    #[async_trait]
    impl CounterStore for DownStore {
        async fn incr(&self, _key: &str) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// Accepts increments but drops expiries.
    #[derive(Default)]
    struct NoExpireStore {
        inner: InMemoryCounterStore,
        dropped_first: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl CounterStore for NoExpireStore {
        async fn incr(&self, key: &str) -> Result<u64, StoreError> {
            self.inner.incr(key).await
        }
        async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
            if !self
                .dropped_first
                .swap(true, std::sync::atomic::Ordering::SeqCst)
            {
                return Ok(());
            }
            self.inner.expire(key, ttl).await
        }
        async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
            self.inner.ttl(key).await
        }
    }

    fn limiter(store: Arc<dyn CounterStore>) -> RateLimiter {
        RateLimiter::new(store, Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn limits_after_n_and_reopens_after_window() {
        let limiter = limiter(Arc::new(InMemoryCounterStore::new()));
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            assert!(!limiter.check("k", 3, window).await.limited);
        }
        tokio::time::advance(Duration::from_secs(20)).await;
        let fourth = limiter.check("k", 3, window).await;
        assert!(fourth.limited);
        assert_eq!(fourth.retry_after, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(41)).await;
        assert!(!limiter.check("k", 3, window).await.limited);
    }

    #[tokio::test]
    async fn scopes_do_not_share_counters() {
        let limiter = limiter(Arc::new(InMemoryCounterStore::new()));
        let one = WindowLimit {
            limit: 1,
            window_secs: 60,
        };
        assert!(!limiter.check_scope(LimitScope::Ip, "10.0.0.1", &one).await.limited);
        assert!(!limiter.check_scope(LimitScope::Email, "10.0.0.1", &one).await.limited);
        assert!(limiter.check_scope(LimitScope::Ip, "10.0.0.1", &one).await.limited);
        assert!(!limiter.check_scope(LimitScope::Ip, "10.0.0.2", &one).await.limited);
    }

    #[tokio::test]
    async fn fails_open_when_store_is_down() {
        let limiter = limiter(Arc::new(DownStore));
        for _ in 0..10 {
            let decision = limiter.check("k", 1, Duration::from_secs(60)).await;
            assert_eq!(decision, RateLimitDecision::allowed());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lost_expiry_is_repaired_when_limited() {
        let limiter = limiter(Arc::new(NoExpireStore::default()));
        let window = Duration::from_secs(30);
        assert!(!limiter.check("k", 1, window).await.limited);

        let limited = limiter.check("k", 1, window).await;
        assert!(limited.limited);
        assert_eq!(limited.retry_after, window);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!limiter.check("k", 1, window).await.limited);
    }

    #[tokio::test(start_paused = true)]
    async fn rotating_identities_do_not_accumulate_counters() {
        let store = Arc::new(InMemoryCounterStore::new());
        let limiter = limiter(store.clone());
        let window = Duration::from_secs(3600);

        for i in 0..10_000u32 {
            let ip = format!("10.{}.{}.{}", i >> 16, (i >> 8) & 0xff, i & 0xff);
            let key = scoped_key(LimitScope::Ip, &ip);
            assert!(!limiter.check(&key, 10, window).await.limited);
        }
        assert_eq!(store.len(), 10_000);

        tokio::time::advance(window).await;
        assert!(!limiter.check("ratelimit:ip:198.51.100.7", 10, window).await.limited);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_checks_never_exceed_limit() {
        let limiter = limiter(Arc::new(InMemoryCounterStore::new()));
        let mut handles = Vec::new();
        for _ in 0..32 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.check("shared", 5, Duration::from_secs(60)).await
            }));
        }
        let mut admitted = 0;
        for handle in handles {
            if !handle.await.unwrap().limited {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }
}
