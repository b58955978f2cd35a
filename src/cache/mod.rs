//! Two-Tier Read-Through Cache
//!
//! A per-process LRU in front of a shared TTL store, with a distributed
//! single-flight lock so that concurrent misses for one key hit the origin
//! once.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          Cache Coordinator                               │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  L1 Cache (process)   │ L2 Cache (shared)    │ Fill Lock (shared)        │
//! │  ┌────────────────┐   │ ┌────────────────┐   │ ┌────────────────────┐    │
//! │  │ BoundedLru     │   │ │ SharedStore    │   │ │ "lock:"+key        │    │
//! │  │ + Mutex        │   │ │ JSON, 30s TTL  │   │ │ SET NX, 5s TTL     │    │
//! │  └────────────────┘   │ └────────────────┘   │ └────────────────────┘    │
//! │         │             │         │            │           │               │
//! │         └─────────────┴─────────┴────────────┴───────────┘               │
//! │                              │                                           │
//! │                        OriginFetcher                                     │
//! │                   (slow source of truth)                                 │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! L1 is never invalidated by writes in other processes; entries only leave
//! it through LRU eviction or [`CacheCoordinator::invalidate`] on the same
//! process.

mod coordinator;
mod l1;
mod lock;
mod lru;
mod metrics;
mod proptest;
mod remote;

pub use coordinator::{CacheCoordinator, CoordinatorConfig, LookupOutcome, LookupSource};
pub use l1::{L1Cache, L1Stats};
pub use lock::{lock_key, DistributedLock, LockAttempt, LockState, LOCK_PREFIX};
pub use lru::{BoundedLru, Iter};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use remote::RemoteCache;

use std::time::Duration;

/// Default number of entries held in L1
pub const DEFAULT_L1_CAPACITY: usize = 1024;

/// Default expiry of values written to L2
pub const DEFAULT_L2_TTL: Duration = Duration::from_secs(30);

/// Default expiry of the fill lock
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(5);

/// Default interval between L2 reads while waiting on another filler
pub const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on waiting before falling back to the origin
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on every configured TTL and wait duration (one year)
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);
