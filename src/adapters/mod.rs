//! Infrastructure Adapters
//!
//! Implementations of the domain ports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │            SharedStore            │         OriginFetcher         │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │     RedisStore │ InMemoryStore  │  HttpOrigin │ SimulatedOrigin  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use stampede_cache::adapters::{RedisConfig, RedisStore, SimulatedOrigin};
//!
//! let store = Arc::new(RedisStore::connect(RedisConfig::default()).await?);
//! let origin = Arc::new(SimulatedOrigin::default());
//! let coordinator = CacheCoordinator::new(CoordinatorConfig::default(), store, origin)?;
//! ```

mod http_origin;
mod memory_store;
mod redis_store;
mod simulated_origin;

pub use http_origin::{HttpOrigin, HttpOriginConfig};
pub use memory_store::{InMemoryStore, StoreStats, DEFAULT_PURGE_INTERVAL};
pub use redis_store::{RedisConfig, RedisStore};
pub use simulated_origin::{SimulatedOrigin, DEFAULT_ORIGIN_DELAY};
