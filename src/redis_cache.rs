//! Redis-backed L2 cache level.

use crate::cache::{DistributedCache, RemoteStats};
use crate::error::CacheError;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::Client;
use std::time::Duration;

/// Shared L2 cache on a Redis server.
///
/// `ConnectionManager` reconnects on its own, so a Redis restart only costs
/// the calls made while it is down. Connecting and every command are bounded
/// by the timeout given to [`RedisCache::connect`].
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Open a managed connection and verify it with a `PING`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(timeout)
            .set_response_timeout(timeout);

        let conn = tokio::time::timeout(timeout, client.get_connection_manager_with_config(config))
            .await
            .map_err(|_| CacheError::Backend(format!("connect timed out after {:?}", timeout)))??;
        let cache = Self { conn };

        tokio::time::timeout(timeout, cache.ping())
            .await
            .map_err(|_| CacheError::Backend(format!("PING timed out after {:?}", timeout)))??;
        Ok(cache)
    }
}

#[async_trait]
impl DistributedCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero TTL
        let seconds = ttl.as_secs().max(1);
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(seconds)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Backend(format!("unexpected PING reply: {}", reply)))
        }
    }

    async fn stats(&self) -> Result<RemoteStats, CacheError> {
        let mut conn = self.conn.clone();
        let total_keys: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        let info: String = redis::cmd("INFO").arg("memory").query_async(&mut conn).await?;

        Ok(RemoteStats {
            total_keys,
            memory_used: used_memory_human(&info),
        })
    }
}

/// Pull `used_memory_human` out of an `INFO memory` reply.
fn used_memory_human(info: &str) -> Option<String> {
    info.lines()
        .find_map(|line| line.trim().strip_prefix("used_memory_human:"))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
