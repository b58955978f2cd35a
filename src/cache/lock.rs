//! Distributed Fill Lock
//!
//! Advisory, TTL-bounded mutual exclusion on top of the shared store's
//! set-if-absent primitive.
//!
//! # Protocol
//!
//! ```text
//!   acquire(k):  SET lock:k <uuid> NX PX <ttl>   → Acquired | Contended
//!   release(a):  DEL lock:k  if value == <uuid>
//! ```
//!
//! - Single attempt, never blocks. Losers become waiters.
//! - A crashed holder is cleaned up by the TTL. A holder that is merely slow
//!   can outlive its TTL, in which case a second leader may run.
//! - Release only deletes the record if it still carries this caller's
//!   token, so a late release cannot free a newer holder's lock.
//! - A [`LockGuard`] dropped without an explicit release (the leader's
//!   future was cancelled) hands the release to a spawned task.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::metrics::CacheMetrics;
use crate::domain::SharedStore;

/// Prefix for lock records in the shared store
pub const LOCK_PREFIX: &str = "lock:";

/// Lock record key for a cache key
pub fn lock_key(key: &str) -> String {
    format!("{}{}", LOCK_PREFIX, key)
}

/// Outcome of a single acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// This caller created the lock record and is the leader
    Acquired,
    /// Someone else holds the lock
    Contended,
    /// The store could not answer
    Unavailable,
}

/// Result of [`DistributedLock::acquire`]
#[derive(Debug, Clone)]
pub struct LockAttempt {
    lock_key: String,
    token: String,
    state: LockState,
}

impl LockAttempt {
    /// Whether this attempt made the caller the lock holder
    pub fn acquired(&self) -> bool {
        self.state == LockState::Acquired
    }

    /// Derived lock record key, available whatever the outcome
    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn state(&self) -> LockState {
        self.state
    }
}

/// Advisory distributed lock
pub struct DistributedLock {
    store: Arc<dyn SharedStore>,
    ttl: Duration,
    metrics: Arc<CacheMetrics>,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn SharedStore>, ttl: Duration, metrics: Arc<CacheMetrics>) -> Self {
        Self { store, ttl, metrics }
    }

    /// Try once to become the holder of the fill lock for `key`.
    pub async fn acquire(&self, key: &str) -> LockAttempt {
        let lock_key = lock_key(key);
        let token = Uuid::new_v4().to_string();

        let state = match self
            .store
            .set_if_absent_with_ttl(&lock_key, &token, self.ttl)
            .await
        {
            Ok(true) => LockState::Acquired,
            Ok(false) => LockState::Contended,
            Err(e) => {
                self.metrics.record_store_error();
                warn!(
                    lock_key = %lock_key,
                    backend = self.store.backend_name(),
                    error = %e,
                    "Lock acquisition failed, store unavailable"
                );
                LockState::Unavailable
            }
        };

        debug!(lock_key = %lock_key, ?state, "Lock attempt");
        LockAttempt {
            lock_key,
            token,
            state,
        }
    }

    /// Release a lock obtained by `attempt`.
    ///
    /// No-op unless the attempt acquired the lock. Failures are logged and
    /// left to the TTL. Returns `true` if the record was deleted.
    pub async fn release(&self, attempt: &LockAttempt) -> bool {
        if !attempt.acquired() {
            return false;
        }
        release_token(
            self.store.as_ref(),
            &self.metrics,
            &attempt.lock_key,
            &attempt.token,
        )
        .await
    }

    /// Tie the lock held by `attempt` to a guard that releases it even if
    /// the holder is dropped before calling [`LockGuard::release`].
    pub fn guard(&self, attempt: LockAttempt) -> LockGuard {
        LockGuard {
            store: Arc::clone(&self.store),
            metrics: Arc::clone(&self.metrics),
            armed: attempt.acquired(),
            attempt,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

async fn release_token(
    store: &dyn SharedStore,
    metrics: &CacheMetrics,
    lock_key: &str,
    token: &str,
) -> bool {
    match store.delete_if_equals(lock_key, token).await {
        Ok(true) => true,
        Ok(false) => {
            warn!(lock_key, "Lock expired before release; left the current holder alone");
            false
        }
        Err(e) => {
            metrics.record_store_error();
            warn!(lock_key, error = %e, "Lock release failed, relying on TTL");
            false
        }
    }
}

/// Scoped hold on an acquired lock.
///
/// Call [`release`](Self::release) on the normal path. If the guard is
/// dropped while still armed, the token-checked delete runs on a spawned
/// task instead.
pub struct LockGuard {
    store: Arc<dyn SharedStore>,
    metrics: Arc<CacheMetrics>,
    attempt: LockAttempt,
    armed: bool,
}

impl LockGuard {
    pub fn attempt(&self) -> &LockAttempt {
        &self.attempt
    }

    /// Release now. Returns `true` if the record was deleted.
    pub async fn release(mut self) -> bool {
        if !self.armed {
            return false;
        }
        let released = release_token(
            self.store.as_ref(),
            &self.metrics,
            &self.attempt.lock_key,
            &self.attempt.token,
        )
        .await;
        self.armed = false;
        released
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let lock_key = std::mem::take(&mut self.attempt.lock_key);
        let token = std::mem::take(&mut self.attempt.token);
        match Handle::try_current() {
            Ok(handle) => {
                debug!(lock_key = %lock_key, "Lock holder dropped, releasing in background");
                let store = Arc::clone(&self.store);
                let metrics = Arc::clone(&self.metrics);
                handle.spawn(async move {
                    release_token(store.as_ref(), &metrics, &lock_key, &token).await;
                });
            }
            Err(_) => {
                warn!(lock_key = %lock_key, "Lock holder dropped outside a runtime, relying on TTL");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
