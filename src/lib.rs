//! Stampede Cache - Two-Tier Read-Through Cache
//!
//! Serves keyed JSON values from a slow origin through an in-process LRU
//! (L1) and a shared TTL store (L2). A distributed lock keyed `lock:{key}`
//! makes sure a burst of concurrent misses for one key, across every
//! process sharing the store, turns into a single origin fetch.
//!
//! # Architecture
//!
//! The crate follows a ports-and-adapters layout:
//!
//! ```text
//! HTTP (server) → CacheCoordinator (cache) → SharedStore / OriginFetcher (domain)
//!                                                   ↑
//!                              RedisStore, InMemoryStore, HttpOrigin (adapters)
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Infrastructure adapters implementing domain ports
//! - [`cache`] - LRU, shared-store wrapper, fill lock and the coordinator
//! - [`domain`] - Port traits
//! - [`error`] - Error types
//! - [`server`] - hyper HTTP front end

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;
pub mod server;

pub use cache::{CacheCoordinator, CoordinatorConfig, LookupOutcome, LookupSource};
pub use error::{Error, Result};
