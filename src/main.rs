//! Stampede Cache Server
//!
//! Runs the two-tier cache behind a small HTTP API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Stampede Cache Server                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │     HTTP     │───▶│    Cache     │───▶│    Origin    │       │
//! │  │    Router    │    │ Coordinator  │    │  (slow path) │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             │                                    │
//! │                 ┌───────────┴───────────┐                        │
//! │                 │  L1 (LRU)  L2 (Redis) │                        │
//! │                 └───────────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stampede_cache::adapters::{
    HttpOrigin, HttpOriginConfig, InMemoryStore, RedisConfig, RedisStore, SimulatedOrigin,
    DEFAULT_PURGE_INTERVAL,
};
use stampede_cache::domain::{OriginFetcher, SharedStore};
use stampede_cache::{server, CacheCoordinator, CoordinatorConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Stampede Cache - two-tier read-through cache with single-flight fills
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    listen_addr: String,

    /// Redis URL for the shared tier (in-memory store when empty)
    #[arg(long, env = "REDIS_URL", default_value = "")]
    redis_url: String,

    /// Prefix for every key written to Redis
    #[arg(long, env = "REDIS_KEY_PREFIX", default_value = "")]
    redis_key_prefix: String,

    /// Origin base URL (simulated origin when empty)
    #[arg(long, env = "ORIGIN_URL", default_value = "")]
    origin_url: String,

    /// Origin request timeout in milliseconds
    #[arg(long, env = "ORIGIN_TIMEOUT_MS", default_value = "10000")]
    origin_timeout_ms: u64,

    /// Artificial latency of the simulated origin in milliseconds
    #[arg(long, env = "ORIGIN_DELAY_MS", default_value = "2000")]
    origin_delay_ms: u64,

    /// Maximum entries in the in-process cache
    #[arg(long, env = "L1_CAPACITY", default_value = "3")]
    l1_capacity: usize,

    /// Shared tier expiry in seconds
    #[arg(long, env = "L2_TTL_SECS", default_value = "30")]
    l2_ttl_secs: u64,

    /// Fill lock expiry in seconds
    #[arg(long, env = "LOCK_TTL_SECS", default_value = "5")]
    lock_ttl_secs: u64,

    /// Waiter poll interval in milliseconds
    #[arg(long, env = "WAIT_POLL_MS", default_value = "100")]
    wait_poll_ms: u64,

    /// How long a waiter polls before going to the origin, in milliseconds
    #[arg(long, env = "WAIT_TIMEOUT_MS", default_value = "5000")]
    wait_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            l1_capacity: self.l1_capacity,
            l2_ttl: Duration::from_secs(self.l2_ttl_secs),
            lock_ttl: Duration::from_secs(self.lock_ttl_secs),
            wait_poll_interval: Duration::from_millis(self.wait_poll_ms),
            wait_timeout: Duration::from_millis(self.wait_timeout_ms),
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args)?;

    info!("Starting Stampede Cache");
    info!("  Listen address: {}", args.listen_addr);
    info!("  L1 capacity: {}", args.l1_capacity);
    info!("  L2 TTL: {}s, lock TTL: {}s", args.l2_ttl_secs, args.lock_ttl_secs);
    info!(
        "  Wait: poll every {}ms for up to {}ms",
        args.wait_poll_ms, args.wait_timeout_ms
    );

    let store = build_store(&args).await?;
    let origin = build_origin(&args)?;

    let coordinator = Arc::new(CacheCoordinator::new(
        args.coordinator_config(),
        store,
        origin,
    )?);

    let listener = server::bind(&args.listen_addr).await?;

    tokio::select! {
        result = server::serve(listener, Arc::clone(&coordinator)) => {
            if let Err(e) = result {
                error!("Cache server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    let metrics = coordinator.metrics();
    info!(
        l1_hits = metrics.l1_hits,
        l2_hits = metrics.l2_hits,
        cache_misses = metrics.cache_misses,
        l1_evictions = metrics.l1_evictions,
        "Shutdown complete"
    );
    Ok(())
}

async fn build_store(args: &Args) -> anyhow::Result<Arc<dyn SharedStore>> {
    if args.redis_url.is_empty() {
        info!("  Shared store: in-memory (single process)");
        let store = Arc::new(InMemoryStore::new());
        store.spawn_purger(DEFAULT_PURGE_INTERVAL);
        return Ok(store);
    }

    let config = RedisConfig {
        url: args.redis_url.clone(),
        key_prefix: args.redis_key_prefix.clone(),
        ..Default::default()
    };
    let store = RedisStore::connect(config).await.map_err(|e| {
        error!("Failed to connect to Redis at {}: {}", args.redis_url, e);
        e
    })?;
    info!("  Shared store: redis");
    Ok(Arc::new(store))
}

fn build_origin(args: &Args) -> anyhow::Result<Arc<dyn OriginFetcher>> {
    if args.origin_url.is_empty() {
        info!("  Origin: simulated, {}ms per fetch", args.origin_delay_ms);
        return Ok(Arc::new(SimulatedOrigin::new(Duration::from_millis(
            args.origin_delay_ms,
        ))));
    }

    let origin = HttpOrigin::new(HttpOriginConfig {
        base_url: args.origin_url.clone(),
        timeout: Duration::from_millis(args.origin_timeout_ms),
    })?;
    info!("  Origin: {}", args.origin_url);
    Ok(Arc::new(origin))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("redis=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["stampede-cache"]);
        assert_eq!(args.listen_addr, "0.0.0.0:8000");
        assert!(args.redis_url.is_empty());

        let config = args.coordinator_config();
        assert_eq!(config.l1_capacity, 3);
        assert_eq!(config.l2_ttl, Duration::from_secs(30));
        assert_eq!(config.lock_ttl, Duration::from_secs(5));
        assert_eq!(config.wait_poll_interval, Duration::from_millis(100));
        assert_eq!(config.wait_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_args_override() {
        let args = Args::parse_from([
            "stampede-cache",
            "--l1-capacity",
            "128",
            "--wait-poll-ms",
            "25",
            "--log-json",
        ]);
        assert!(args.log_json);
        assert_eq!(args.coordinator_config().l1_capacity, 128);
        assert_eq!(
            args.coordinator_config().wait_poll_interval,
            Duration::from_millis(25)
        );
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let args = Args::parse_from(["stampede-cache", "--wait-poll-ms", "0"]);
        assert!(args.coordinator_config().validate().is_err());
    }

    #[test]
    fn test_huge_lock_ttl_rejected() {
        let args = Args::parse_from(["stampede-cache", "--lock-ttl-secs", "18446744073709551615"]);
        assert!(args.coordinator_config().validate().is_err());
    }
}
