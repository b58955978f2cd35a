//! L2 Cache - Shared Remote Tier
//!
//! JSON-encoded values in the [`SharedStore`] with a fixed TTL.
//!
//! Store failures never leave this module: a failed read is a miss, a failed
//! write or delete is logged and dropped. Each one bumps `store_errors`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};

use super::metrics::CacheMetrics;
use crate::domain::SharedStore;

/// L2 cache over the shared store
pub struct RemoteCache {
    store: Arc<dyn SharedStore>,
    ttl: Duration,
    metrics: Arc<CacheMetrics>,
}

impl RemoteCache {
    pub fn new(store: Arc<dyn SharedStore>, ttl: Duration, metrics: Arc<CacheMetrics>) -> Self {
        Self { store, ttl, metrics }
    }

    /// Read and decode the value for `key`.
    ///
    /// Unreachable store and undecodable payloads both read as `None`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                self.metrics.record_store_error();
                warn!(key, backend = self.store.backend_name(), error = %e, "L2 read failed, treating as miss");
                return None;
            }
        };

        match decode(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Undecodable L2 payload, treating as miss");
                None
            }
        }
    }

    /// Encode and store `value` under `key` with the configured TTL.
    ///
    /// Returns whether the write reached the store.
    pub async fn set(&self, key: &str, value: &Value) -> bool {
        let raw = match encode(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode value for L2");
                return false;
            }
        };

        match self.store.set_with_ttl(key, raw, self.ttl).await {
            Ok(()) => {
                debug!(key, ttl_secs = self.ttl.as_secs(), "Wrote L2");
                true
            }
            Err(e) => {
                self.metrics.record_store_error();
                warn!(key, backend = self.store.backend_name(), error = %e, "L2 write failed");
                false
            }
        }
    }

    /// Remove `key` from the shared tier
    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.metrics.record_store_error();
                warn!(key, backend = self.store.backend_name(), error = %e, "L2 delete failed");
                false
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Encode a value for the shared tier
pub fn encode(value: &Value) -> crate::error::Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Decode a value read from the shared tier
pub fn decode(raw: &[u8]) -> crate::error::Result<Value> {
    Ok(serde_json::from_slice(raw)?)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use serde_json::json;

    fn make_remote(store: Arc<InMemoryStore>) -> (RemoteCache, Arc<CacheMetrics>) {
        let metrics = Arc::new(CacheMetrics::new());
        let remote = RemoteCache::new(store, Duration::from_secs(30), Arc::clone(&metrics));
        (remote, metrics)
    }

    #[test]
    fn test_encoding_preserves_structure() {
        let value = json!({"id": 7, "tags": ["a", "b"], "nested": {"ok": true, "n": null}});
        let raw = encode(&value).unwrap();
        assert_eq!(decode(&raw).unwrap(), value);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = Arc::new(InMemoryStore::new());
        let (remote, _) = make_remote(Arc::clone(&store));

        assert!(remote.set("k", &json!({"v": 1})).await);
        assert_eq!(remote.get("k").await, Some(json!({"v": 1})));
        assert!(store.ttl_remaining("k").unwrap() <= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = Arc::new(InMemoryStore::new());
        let (remote, metrics) = make_remote(store);

        assert!(remote.get("nope").await.is_none());
        assert_eq!(metrics.store_errors(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_a_miss() {
        let store = Arc::new(InMemoryStore::new());
        store
            .set_with_ttl("k", Bytes::from_static(b"{not json"), Duration::from_secs(30))
            .await
            .unwrap();
        let (remote, _) = make_remote(Arc::clone(&store));

        assert!(remote.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades() {
        let store = Arc::new(InMemoryStore::new());
        let (remote, metrics) = make_remote(Arc::clone(&store));
        store.set_offline(true);

        assert!(remote.get("k").await.is_none());
        assert!(!remote.set("k", &json!(1)).await);
        assert!(!remote.delete("k").await);
        assert_eq!(metrics.store_errors(), 3);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = Arc::new(InMemoryStore::new());
        let (remote, _) = make_remote(store);

        remote.set("k", &json!("v")).await;
        assert!(remote.delete("k").await);
        assert!(!remote.delete("k").await);
        assert!(remote.get("k").await.is_none());
    }
}
