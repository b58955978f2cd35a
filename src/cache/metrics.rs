//! Cache Metrics Collection
//!
//! Process-wide counters for the lookup path. All counters start at zero,
//! only ever go up, and reset only when the process restarts.

use std::sync::atomic::{AtomicU64, Ordering};

use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Error, Result};

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    cache_misses: AtomicU64,
    l1_evictions: AtomicU64,

    // Diagnostics beyond the four core counters
    origin_fetches: AtomicU64,
    lock_contended: AtomicU64,
    wait_timeouts: AtomicU64,
    store_errors: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector with every counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_l1_hit(&self) {
        self.l1_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_l2_hit(&self) {
        self.l2_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_l1_eviction(&self) {
        self.l1_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_origin_fetch(&self) {
        self.origin_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_contended(&self) {
        self.lock_contended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wait_timeout(&self) {
        self.wait_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn l1_hits(&self) -> u64 {
        self.l1_hits.load(Ordering::Relaxed)
    }

    pub fn l2_hits(&self) -> u64 {
        self.l2_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn l1_evictions(&self) -> u64 {
        self.l1_evictions.load(Ordering::Relaxed)
    }

    pub fn origin_fetches(&self) -> u64 {
        self.origin_fetches.load(Ordering::Relaxed)
    }

    pub fn lock_contended(&self) -> u64 {
        self.lock_contended.load(Ordering::Relaxed)
    }

    pub fn wait_timeouts(&self) -> u64 {
        self.wait_timeouts.load(Ordering::Relaxed)
    }

    pub fn store_errors(&self) -> u64 {
        self.store_errors.load(Ordering::Relaxed)
    }

    /// Fraction of lookups answered by either cache tier
    pub fn hit_ratio(&self) -> f64 {
        let hits = (self.l1_hits() + self.l2_hits()) as f64;
        let total = hits + self.cache_misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            l1_hits: self.l1_hits(),
            l2_hits: self.l2_hits(),
            cache_misses: self.cache_misses(),
            l1_evictions: self.l1_evictions(),
            origin_fetches: self.origin_fetches(),
            lock_contended: self.lock_contended(),
            wait_timeouts: self.wait_timeouts(),
            store_errors: self.store_errors(),
            hit_ratio: self.hit_ratio(),
        }
    }

    /// Render the counters in Prometheus text exposition format.
    pub fn encode_prometheus(&self) -> Result<String> {
        let registry = Registry::new_custom(Some("stampede_cache".to_string()), None)
            .map_err(|e| Error::Internal(format!("Failed to create registry: {}", e)))?;

        let counters = [
            ("l1_hits_total", "Lookups answered from the in-process LRU", self.l1_hits()),
            ("l2_hits_total", "Lookups answered from the shared store", self.l2_hits()),
            ("cache_misses_total", "Lookups that went to the origin", self.cache_misses()),
            ("l1_evictions_total", "Entries evicted from the in-process LRU", self.l1_evictions()),
            ("origin_fetches_total", "Calls made to the origin", self.origin_fetches()),
            ("lock_contended_total", "Fill lock attempts lost to another leader", self.lock_contended()),
            ("wait_timeouts_total", "Waiters that gave up and fell back to the origin", self.wait_timeouts()),
            ("store_errors_total", "Shared store operations that failed", self.store_errors()),
        ];

        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(Opts::new(name, help))
                .map_err(|e| Error::Internal(format!("Invalid metric {}: {}", name, e)))?;
            counter.inc_by(value);
            registry
                .register(Box::new(counter))
                .map_err(|e| Error::Internal(format!("Failed to register {}: {}", name, e)))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(|e| Error::Internal(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
    }
}

/// Point-in-time view of [`CacheMetrics`], serialized for `/metrics`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub cache_misses: u64,
    pub l1_evictions: u64,
    pub origin_fetches: u64,
    pub lock_contended: u64,
    pub wait_timeouts: u64,
    pub store_errors: u64,
    pub hit_ratio: f64,
}

// =============================================================================
// Tests
// =============================================================================
