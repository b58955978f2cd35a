//! Cache Coordinator - Read-through Lookup with Single-flight Fills
//!
//! Ties L1, L2, the fill lock and the origin together.
//!
//! # Lookup State Machine
//!
//! ```text
//!   lookup(k)
//!     │
//!     ├─ L1 hit ─────────────────────────────────────────► return      (l1_hits)
//!     ├─ L2 hit ──────────────► L1.put ──────────────────► return      (l2_hits)
//!     └─ miss ─► acquire lock:k
//!                  ├─ Acquired ─► origin ─► L2.set ─► L1.put ─► release ─► return
//!                  │                                           (cache_misses)
//!                  ├─ Contended ─► poll L2 every 100ms for 5s
//!                  │                 ├─ value ─► L1.put ─────► return  (l2_hits)
//!                  │                 └─ timeout ─┐
//!                  └─ Unavailable ───────────────┴─► origin ─► return  (cache_misses)
//!                                                   (no cache writes)
//! ```
//!
//! The leader releases the lock on every exit path, including origin failure
//! and cancellation of the lookup future.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::l1::L1Cache;
use super::lock::{DistributedLock, LockState};
use super::metrics::{CacheMetrics, MetricsSnapshot};
use super::remote::RemoteCache;
use super::{
    DEFAULT_L1_CAPACITY, DEFAULT_L2_TTL, DEFAULT_LOCK_TTL, DEFAULT_WAIT_POLL_INTERVAL,
    DEFAULT_WAIT_TIMEOUT, MAX_DURATION,
};
use crate::domain::{OriginFetcher, SharedStore};
use crate::error::{Error, Result};

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum number of entries in L1
    pub l1_capacity: usize,
    /// Expiry of values written to L2
    pub l2_ttl: Duration,
    /// Expiry of the fill lock
    pub lock_ttl: Duration,
    /// How often a waiter re-reads L2
    pub wait_poll_interval: Duration,
    /// How long a waiter polls before falling back to the origin
    pub wait_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            l1_capacity: DEFAULT_L1_CAPACITY,
            l2_ttl: DEFAULT_L2_TTL,
            lock_ttl: DEFAULT_LOCK_TTL,
            wait_poll_interval: DEFAULT_WAIT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl CoordinatorConfig {
    /// Reject settings the lookup path cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.l2_ttl.is_zero() {
            return Err(Error::Config("l2_ttl must be greater than zero".into()));
        }
        if self.lock_ttl.is_zero() {
            return Err(Error::Config("lock_ttl must be greater than zero".into()));
        }
        if self.wait_poll_interval.is_zero() {
            return Err(Error::Config(
                "wait_poll_interval must be greater than zero".into(),
            ));
        }
        for (name, value) in [
            ("l2_ttl", self.l2_ttl),
            ("lock_ttl", self.lock_ttl),
            ("wait_poll_interval", self.wait_poll_interval),
            ("wait_timeout", self.wait_timeout),
        ] {
            if value > MAX_DURATION {
                return Err(Error::Config(format!(
                    "{} must be at most {}s, got {}s",
                    name,
                    MAX_DURATION.as_secs(),
                    value.as_secs()
                )));
            }
        }
        Ok(())
    }
}

/// Where a lookup's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    /// In-process LRU
    L1,
    /// Shared store, found on the first read
    L2,
    /// This request won the lock and fetched from the origin
    Leader,
    /// Another leader filled L2 while this request waited
    Waiter,
    /// Fetched from the origin without populating either tier
    Fallback,
}

impl LookupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupSource::L1 => "l1",
            LookupSource::L2 => "l2",
            LookupSource::Leader => "leader",
            LookupSource::Waiter => "waiter",
            LookupSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for LookupSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value plus the path that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutcome {
    pub value: Value,
    pub source: LookupSource,
}

impl LookupOutcome {
    fn new(value: Value, source: LookupSource) -> Self {
        Self { value, source }
    }
}

/// Two-tier read-through cache with stampede protection
pub struct CacheCoordinator {
    l1: L1Cache,
    remote: RemoteCache,
    lock: DistributedLock,
    origin: Arc<dyn OriginFetcher>,
    metrics: Arc<CacheMetrics>,
    config: CoordinatorConfig,
}

impl CacheCoordinator {
    /// Create a coordinator with its own metrics
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn SharedStore>,
        origin: Arc<dyn OriginFetcher>,
    ) -> Result<Self> {
        Self::with_metrics(config, store, origin, Arc::new(CacheMetrics::new()))
    }

    /// Create a coordinator reporting into existing metrics
    pub fn with_metrics(
        config: CoordinatorConfig,
        store: Arc<dyn SharedStore>,
        origin: Arc<dyn OriginFetcher>,
        metrics: Arc<CacheMetrics>,
    ) -> Result<Self> {
        config.validate()?;

        info!(
            l1_capacity = config.l1_capacity,
            l2_ttl_secs = config.l2_ttl.as_secs(),
            lock_ttl_ms = config.lock_ttl.as_millis() as u64,
            backend = store.backend_name(),
            origin = origin.origin_name(),
            "Cache coordinator initialized"
        );

        Ok(Self {
            l1: L1Cache::new(config.l1_capacity, Arc::clone(&metrics)),
            remote: RemoteCache::new(Arc::clone(&store), config.l2_ttl, Arc::clone(&metrics)),
            lock: DistributedLock::new(store, config.lock_ttl, Arc::clone(&metrics)),
            origin,
            metrics,
            config,
        })
    }

    /// Get the value for `key`, filling the caches on a miss.
    ///
    /// Only origin failures are returned as errors; store trouble degrades
    /// to the fallback path.
    pub async fn lookup(&self, key: &str) -> Result<Value> {
        self.lookup_traced(key).await.map(|outcome| outcome.value)
    }

    /// Like [`lookup`](Self::lookup), also reporting which path answered
    #[instrument(skip(self), fields(source))]
    pub async fn lookup_traced(&self, key: &str) -> Result<LookupOutcome> {
        let outcome = self.resolve(key).await?;
        tracing::Span::current().record("source", tracing::field::display(outcome.source));
        debug!(source = %outcome.source, "Lookup served");
        Ok(outcome)
    }

    async fn resolve(&self, key: &str) -> Result<LookupOutcome> {
        if let Some(value) = self.l1.get(key) {
            self.metrics.record_l1_hit();
            return Ok(LookupOutcome::new(value, LookupSource::L1));
        }

        if let Some(value) = self.remote.get(key).await {
            self.metrics.record_l2_hit();
            self.l1.put(key, value.clone());
            return Ok(LookupOutcome::new(value, LookupSource::L2));
        }

        let attempt = self.lock.acquire(key).await;
        match attempt.state() {
            LockState::Acquired => {
                // Released by the guard even if this future is dropped mid-fill
                let guard = self.lock.guard(attempt);
                let filled = self.fill_as_leader(key).await;
                guard.release().await;
                filled.map(|value| LookupOutcome::new(value, LookupSource::Leader))
            }
            LockState::Contended => {
                self.metrics.record_lock_contended();
                if let Some(value) = self.wait_for_fill(key).await {
                    self.metrics.record_l2_hit();
                    self.l1.put(key, value.clone());
                    return Ok(LookupOutcome::new(value, LookupSource::Waiter));
                }
                self.metrics.record_wait_timeout();
                warn!(
                    key,
                    timeout_ms = self.config.wait_timeout.as_millis() as u64,
                    "No fill observed before wait timeout, falling back to origin"
                );
                self.fallback(key).await
            }
            LockState::Unavailable => self.fallback(key).await,
        }
    }

    /// Leader path: fetch, write L2, then L1. Writes nothing if the fetch fails.
    async fn fill_as_leader(&self, key: &str) -> Result<Value> {
        self.metrics.record_cache_miss();
        let value = self.fetch_origin(key).await?;

        self.remote.set(key, &value).await;
        self.l1.put(key, value.clone());
        Ok(value)
    }

    /// Poll L2 until a value shows up or the wait timeout passes
    async fn wait_for_fill(&self, key: &str) -> Option<Value> {
        let deadline = Instant::now() + self.config.wait_timeout;

        loop {
            if let Some(value) = self.remote.get(key).await {
                return Some(value);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            tokio::time::sleep(self.config.wait_poll_interval.min(deadline - now)).await;
        }
    }

    async fn fallback(&self, key: &str) -> Result<LookupOutcome> {
        self.metrics.record_cache_miss();
        let value = self.fetch_origin(key).await?;
        Ok(LookupOutcome::new(value, LookupSource::Fallback))
    }

    async fn fetch_origin(&self, key: &str) -> Result<Value> {
        self.metrics.record_origin_fetch();
        self.origin.fetch(key).await.map_err(|e| match e {
            Error::Origin { .. } => e,
            other => Error::origin(key, other),
        })
    }

    /// Drop `key` from both tiers. Returns `true` if either tier held it.
    pub async fn invalidate(&self, key: &str) -> bool {
        let in_l1 = self.l1.remove(key).is_some();
        let in_l2 = self.remote.delete(key).await;
        info!(key, in_l1, in_l2, "Invalidated");
        in_l1 || in_l2
    }

    /// Get metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Shared handle to the metrics
    pub fn metrics_handle(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Get reference to L1 cache
    pub fn l1(&self) -> &L1Cache {
        &self.l1
    }

    /// Get configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStore, SimulatedOrigin};
    use crate::cache::lock::lock_key;
    use assert_matches::assert_matches;

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            l1_capacity: 3,
            wait_poll_interval: Duration::from_millis(5),
            wait_timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    fn make(
        config: CoordinatorConfig,
        delay: Duration,
    ) -> (CacheCoordinator, Arc<InMemoryStore>, Arc<SimulatedOrigin>) {
        let store = Arc::new(InMemoryStore::new());
        let origin = Arc::new(SimulatedOrigin::new(delay).failing_on("bad:"));
        let coordinator =
            CacheCoordinator::new(config, store.clone(), origin.clone()).unwrap();
        (coordinator, store, origin)
    }

    #[test]
    fn test_default_config_matches_reference_constants() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.l2_ttl, Duration::from_secs(30));
        assert_eq!(config.lock_ttl, Duration::from_secs(5));
        assert_eq!(config.wait_poll_interval, Duration::from_millis(100));
        assert_eq!(config.wait_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = CoordinatorConfig {
            wait_poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(Error::Config(_)));

        let config = CoordinatorConfig {
            l1_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_unbounded_durations() {
        let config = CoordinatorConfig {
            lock_ttl: Duration::from_secs(u64::MAX),
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(Error::Config(msg)) if msg.contains("lock_ttl"));

        let config = CoordinatorConfig {
            wait_timeout: Duration::MAX,
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(Error::Config(_)));

        let config = CoordinatorConfig {
            l2_ttl: MAX_DURATION,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_lookup_path_progression() {
        let (coordinator, _store, origin) = make(fast_config(), Duration::ZERO);

        let first = coordinator.lookup_traced("k").await.unwrap();
        assert_eq!(first.source, LookupSource::Leader);

        let second = coordinator.lookup_traced("k").await.unwrap();
        assert_eq!(second.source, LookupSource::L1);
        assert_eq!(second.value, first.value);

        coordinator.l1().remove("k");
        let third = coordinator.lookup_traced("k").await.unwrap();
        assert_eq!(third.source, LookupSource::L2);

        assert_eq!(origin.fetch_count(), 1);
        let m = coordinator.metrics();
        assert_eq!((m.l1_hits, m.l2_hits, m.cache_misses), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_leader_failure_releases_lock_and_writes_nothing() {
        let (coordinator, store, _origin) = make(fast_config(), Duration::ZERO);

        let err = coordinator.lookup("bad:1").await.unwrap_err();
        assert_matches!(err, Error::Origin { .. });

        assert!(!store.contains_key(&lock_key("bad:1")));
        assert!(!store.contains_key("bad:1"));
        assert!(!coordinator.l1().contains("bad:1"));
        assert_eq!(coordinator.metrics().cache_misses, 1);
    }

    #[tokio::test]
    async fn test_store_unavailable_falls_back_without_waiting() {
        let (coordinator, store, origin) = make(fast_config(), Duration::ZERO);
        store.set_offline(true);

        let started = std::time::Instant::now();
        let outcome = coordinator.lookup_traced("k").await.unwrap();
        assert_eq!(outcome.source, LookupSource::Fallback);
        assert!(started.elapsed() < coordinator.config().wait_timeout);

        assert_eq!(origin.fetch_count(), 1);
        assert!(!coordinator.l1().contains("k"));
        let m = coordinator.metrics();
        assert_eq!(m.cache_misses, 1);
        assert_eq!(m.store_errors, 2); // L2 read + lock attempt
        assert_eq!(m.wait_timeouts, 0);
    }

    #[tokio::test]
    async fn test_invalidate_clears_both_tiers() {
        let (coordinator, store, origin) = make(fast_config(), Duration::ZERO);
        coordinator.lookup("k").await.unwrap();

        assert!(coordinator.invalidate("k").await);
        assert!(!coordinator.l1().contains("k"));
        assert!(!store.contains_key("k"));
        assert!(!coordinator.invalidate("k").await);

        let outcome = coordinator.lookup_traced("k").await.unwrap();
        assert_eq!(outcome.source, LookupSource::Leader);
        assert_eq!(origin.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_l1_eviction_is_counted() {
        let (coordinator, _store, _origin) = make(fast_config(), Duration::ZERO);
        for key in ["a", "b", "c", "d"] {
            coordinator.lookup(key).await.unwrap();
        }

        assert_eq!(coordinator.metrics().l1_evictions, 1);
        assert!(!coordinator.l1().contains("a"));
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let (coordinator, _store, origin) = make(
            CoordinatorConfig {
                wait_timeout: Duration::from_secs(2),
                ..fast_config()
            },
            Duration::from_millis(50),
        );
        let coordinator = Arc::new(coordinator);

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.lookup_traced("hot").await })
            })
            .collect();

        let mut leaders = 0;
        for result in futures::future::join_all(tasks).await {
            let outcome = result.unwrap().unwrap();
            assert_eq!(outcome.value["key"], "hot");
            if outcome.source == LookupSource::Leader {
                leaders += 1;
            } else {
                assert_eq!(outcome.source, LookupSource::Waiter);
            }
        }

        assert_eq!(leaders, 1);
        assert_eq!(origin.fetch_count(), 1);
        let m = coordinator.metrics();
        assert_eq!(m.cache_misses, 1);
        assert_eq!(m.l2_hits, 9);
        assert_eq!(m.lock_contended, 9);
    }

    #[tokio::test]
    async fn test_cancelled_leader_releases_lock() {
        let (coordinator, store, origin) = make(fast_config(), Duration::from_millis(500));
        let coordinator = Arc::new(coordinator);

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.lookup("k").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.contains_key(&lock_key("k")));

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!store.contains_key(&lock_key("k")));
        assert!(!store.contains_key("k"));

        // The next request leads at once instead of waiting out the lock TTL
        let outcome = coordinator.lookup_traced("k").await.unwrap();
        assert_eq!(outcome.source, LookupSource::Leader);
        assert_eq!(origin.fetch_count(), 2);
    }
}
