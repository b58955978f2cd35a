//! Simulated Origin
//!
//! A slow, in-process stand-in for the real data source. Each fetch sleeps
//! for the configured delay and returns a small JSON record for the key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::OriginFetcher;
use crate::error::{Error, Result};

/// Default artificial latency per fetch
pub const DEFAULT_ORIGIN_DELAY: Duration = Duration::from_secs(2);

/// Slow in-process origin
pub struct SimulatedOrigin {
    delay: Duration,
    fail_prefix: Option<String>,
    fetches: AtomicU64,
}

impl SimulatedOrigin {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail_prefix: None,
            fetches: AtomicU64::new(0),
        }
    }

    /// Fail every fetch whose key starts with `prefix`
    pub fn failing_on(mut self, prefix: impl Into<String>) -> Self {
        self.fail_prefix = Some(prefix.into());
        self
    }

    /// Number of fetches served so far, failed ones included
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedOrigin {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN_DELAY)
    }
}

#[async_trait]
impl OriginFetcher for SimulatedOrigin {
    async fn fetch(&self, key: &str) -> Result<Value> {
        let n = self.fetches.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(key, fetch = n, delay_ms = self.delay.as_millis() as u64, "Simulated origin fetch");

        tokio::time::sleep(self.delay).await;

        if let Some(prefix) = &self.fail_prefix {
            if key.starts_with(prefix.as_str()) {
                return Err(Error::origin(key, "simulated origin failure"));
            }
        }

        Ok(json!({
            "key": key,
            "value": format!("data_for_{}", key),
            "fetched_at": Utc::now().to_rfc3339(),
        }))
    }

    fn origin_name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_fetch() {
        let origin = SimulatedOrigin::new(Duration::from_millis(5));
        let value = origin.fetch("abc").await.unwrap();

        assert_eq!(value["key"], "abc");
        assert_eq!(value["value"], "data_for_abc");
        assert!(value["fetched_at"].is_string());
        assert_eq!(origin.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let origin = SimulatedOrigin::new(Duration::ZERO).failing_on("missing:");

        assert!(origin.fetch("missing:1").await.is_err());
        assert!(origin.fetch("present:1").await.is_ok());
        assert_eq!(origin.fetch_count(), 2);
    }
}
