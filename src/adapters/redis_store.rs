//! Redis Shared Store Adapter
//!
//! Implements the `SharedStore` port on Redis over a multiplexed async
//! connection.
//!
//! | Port operation           | Redis command                         |
//! |--------------------------|---------------------------------------|
//! | `get`                    | `GET key`                             |
//! | `set_with_ttl`           | `PSETEX key ms value`                 |
//! | `set_if_absent_with_ttl` | `SET key token NX PX ms`              |
//! | `delete`                 | `DEL key`                             |
//! | `delete_if_equals`       | Lua: `GET == token` then `DEL`        |

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::info;

use crate::cache::MAX_DURATION;
use crate::domain::SharedStore;
use crate::error::{Error, Result};

/// Atomically delete KEYS[1] only if it still holds ARGV[1]
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL
    pub url: String,
    /// Prefix prepended to every key (cache entries and locks alike)
    pub key_prefix: String,
    /// Per-command timeout
    pub command_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
            command_timeout: Duration::from_secs(2),
        }
    }
}

/// Redis-backed shared store
pub struct RedisStore {
    conn: MultiplexedConnection,
    config: RedisConfig,
    compare_and_delete: Script,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let mut conn = client.get_multiplexed_async_connection().await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(url = %config.url, "Connected to Redis");

        Ok(Self {
            conn,
            config,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Bound a command by the configured timeout
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.config.command_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Store(format!(
                "redis {} timed out after {:?}",
                op, self.config.command_timeout
            ))),
        }
    }
}

/// Expiry in whole milliseconds, clamped to `1..=MAX_DURATION`
fn ttl_millis(ttl: Duration) -> u64 {
    let millis = ttl.min(MAX_DURATION).as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.conn.clone();
        let key = self.full_key(key);

        let data: Option<Vec<u8>> = self.timed("GET", conn.get(&key)).await?;
        Ok(data.map(Bytes::from))
    }

    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = self.full_key(key);

        self.timed(
            "PSETEX",
            conn.pset_ex::<_, _, ()>(&key, value.as_ref(), ttl_millis(ttl)),
        )
        .await
    }

    async fn set_if_absent_with_ttl(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let key = self.full_key(key);

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl));

        // Nil reply means the key already existed
        let reply: Option<String> = self.timed("SET NX", cmd.query_async(&mut conn)).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let key = self.full_key(key);

        let deleted: i64 = self.timed("DEL", conn.del(&key)).await?;
        Ok(deleted > 0)
    }

    async fn delete_if_equals(&self, key: &str, token: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let key = self.full_key(key);

        let mut invocation = self.compare_and_delete.key(&key);
        invocation.arg(token);

        let deleted: i64 = self
            .timed("EVALSHA", invocation.invoke_async(&mut conn))
            .await?;
        Ok(deleted > 0)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

// =============================================================================
// Tests
// =============================================================================
