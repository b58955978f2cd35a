//! L1 Cache - In-process Hot Cache
//!
//! A [`BoundedLru`] behind a single mutex, shared by every request.
//!
//! # Design
//!
//! - One `parking_lot::Mutex` around the whole list: relinking touches up
//!   to four nodes, so per-key locking would not make it safe.
//! - The guard never escapes a method, so it is never held across `.await`.
//! - Values are cloned out; callers never see a reference into the list.
//! - Every eviction is reported to [`CacheMetrics`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::lru::BoundedLru;
use super::metrics::CacheMetrics;

/// L1 Cache - in-process bounded LRU
pub struct L1Cache {
    inner: Mutex<BoundedLru<String, Value>>,
    metrics: Arc<CacheMetrics>,
}

impl L1Cache {
    /// Create an L1 cache holding at most `capacity` values
    pub fn new(capacity: usize, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            inner: Mutex::new(BoundedLru::new(capacity)),
            metrics,
        }
    }

    /// Get a value and mark it most recently used
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().get(key).cloned()
    }

    /// Insert or overwrite a value.
    ///
    /// Returns `true` if an older entry was evicted to make room.
    pub fn put(&self, key: &str, value: Value) -> bool {
        let evicted = self.inner.lock().put(key.to_string(), value);

        match evicted {
            Some((evicted_key, _)) => {
                self.metrics.record_l1_eviction();
                debug!(key = %evicted_key, "Evicted from L1");
                true
            }
            None => false,
        }
    }

    /// Remove an entry from the cache
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().remove(key)
    }

    /// Check if cache contains a key (does not refresh recency)
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().keys_mru()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Get capacity
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> L1Stats {
        let inner = self.inner.lock();
        L1Stats {
            entries: inner.len(),
            capacity: inner.capacity(),
            evictions: self.metrics.l1_evictions(),
        }
    }
}

/// L1 cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1Stats {
    /// Number of entries
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Eviction count
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================
