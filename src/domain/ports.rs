//! Domain Ports (Port/Adapter Pattern)
//!
//! The cache core depends only on these traits. Adapters in
//! [`crate::adapters`] provide the concrete implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Cache Core                              │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │          SharedStore      │      OriginFetcher       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  RedisStore │ InMemoryStore │ HttpOrigin │ Simulated │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::Result;

// =============================================================================
// Shared Store
// =============================================================================

/// Port for the shared, TTL-capable key-value store behind L2.
///
/// Every method is a single atomic operation at the store. Nothing spans
/// more than one call, so callers must tolerate races between steps.
///
/// # Example
///
/// ```ignore
/// struct RedisStore { /* ... */ }
///
/// #[async_trait]
/// impl SharedStore for RedisStore {
///     async fn get(&self, key: &str) -> Result<Option<Bytes>> {
///         // GET key
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Read the raw bytes stored under `key`, if any and not expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Unconditionally store `value` under `key`, expiring after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Store `token` under `key` only if `key` is absent.
    ///
    /// Returns `true` if this call created the key.
    async fn set_if_absent_with_ttl(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;

    /// Delete `key`. Returns `true` if something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete `key` only while it still holds `token`.
    ///
    /// Returns `true` if the key matched and was removed.
    async fn delete_if_equals(&self, key: &str, token: &str) -> Result<bool>;

    /// Short name of the backend, used in logs.
    fn backend_name(&self) -> &'static str;
}

// =============================================================================
// Origin
// =============================================================================

/// Port for the authoritative (slow, fallible) data source.
///
/// Implementations must not touch either cache tier; population is the
/// coordinator's job.
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    /// Produce the authoritative value for `key`.
    async fn fetch(&self, key: &str) -> Result<Value>;

    /// Short name of the origin, used in logs.
    fn origin_name(&self) -> &'static str;
}
