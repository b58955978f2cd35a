//! Domain Layer
//!
//! Trait abstractions for everything the cache core talks to but does not
//! own: the shared store and the origin.
//!
//! # Usage
//!
//! ```ignore
//! use stampede_cache::domain::{OriginFetcher, SharedStore};
//!
//! async fn warm<S: SharedStore, O: OriginFetcher>(store: &S, origin: &O, key: &str) -> Result<()> {
//!     let value = origin.fetch(key).await?;
//!     store.set_with_ttl(key, serde_json::to_vec(&value)?.into(), Duration::from_secs(30)).await
//! }
//! ```

pub mod ports;

pub use ports::{OriginFetcher, SharedStore};
