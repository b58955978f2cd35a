//! In-Memory Shared Store
//!
//! Implements the `SharedStore` port with a `DashMap` and per-key expiry.
//! Used for tests, local development, and single-node deployments where no
//! Redis is configured.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::SharedStore;
use crate::error::{Error, Result};

/// Default interval of the background expiry sweep
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct StoredValue {
    data: Bytes,
    /// `None` when `now + ttl` is not representable: never expires
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(data: Bytes, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map_or(false, |expires_at| Instant::now() >= expires_at)
    }
}

/// Operation counters for [`InMemoryStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Read operations
    pub reads: u64,
    /// Write operations (including conditional sets)
    pub writes: u64,
    /// Delete operations (including conditional deletes)
    pub deletes: u64,
}

/// In-memory store with TTL expiry.
///
/// Expired keys are dropped when touched and by [`purge_expired`], which
/// [`spawn_purger`] runs periodically. `set_offline(true)` makes
/// every operation fail with [`Error::Store`], for exercising the
/// unavailable-store paths.
///
/// [`purge_expired`]: Self::purge_expired
/// [`spawn_purger`]: Self::spawn_purger
#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<String, StoredValue>,
    offline: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store going away (or coming back)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Whether a live (unexpired) value exists under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|v| !v.is_expired())
            .unwrap_or(false)
    }

    /// Time left before `key` expires (`Duration::MAX` if it never does)
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let entry = self.entries.get(key)?;
        match entry.expires_at {
            Some(expires_at) => expires_at.checked_duration_since(Instant::now()),
            None => Some(Duration::MAX),
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, v| !v.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Run [`purge_expired`](Self::purge_expired) every `interval` until the
    /// store is dropped.
    pub fn spawn_purger(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = store.len(), "Purged expired entries");
                }
            }
        })
    }

    /// Number of stored keys, including expired ones not yet dropped
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Store("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        // Copy out before any removal: holding a shard ref while removing deadlocks
        let found = self
            .entries
            .get(key)
            .map(|v| (v.is_expired(), v.data.clone()));

        match found {
            Some((false, data)) => Ok(Some(data)),
            Some((true, _)) => {
                self.entries.remove_if(key, |_, v| v.is_expired());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.check_online()?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        self.entries
            .insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent_with_ttl(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        self.check_online()?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        let value = StoredValue::new(Bytes::copy_from_slice(token.as_bytes()), ttl);
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(value);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(value);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_online()?;
        self.deletes.fetch_add(1, Ordering::Relaxed);

        Ok(self
            .entries
            .remove(key)
            .map(|(_, v)| !v.is_expired())
            .unwrap_or(false))
    }

    async fn delete_if_equals(&self, key: &str, token: &str) -> Result<bool> {
        self.check_online()?;
        self.deletes.fetch_add(1, Ordering::Relaxed);

        Ok(self
            .entries
            .remove_if(key, |_, v| !v.is_expired() && v.data.as_ref() == token.as_bytes())
            .is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Tests
// =============================================================================
