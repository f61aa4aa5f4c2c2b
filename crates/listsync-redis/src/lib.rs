// # Redis Cache
//
// This crate provides the Redis cache backend for listsync. The readers of
// the lists cache their lookups in a Redis database; after every replace
// the engine empties that database with FLUSHDB.
//
// ## Connection
//
// - The client is built from the URL without connecting, so a cache that
//   is down at startup does not stop the daemon
// - One multiplexed connection is opened on the first flush and reused
// - A failed command drops the connection; the next flush reconnects
// - Connecting and flushing are bounded by `REDIS_TIMEOUT`

use listsync_core::config::CacheConfig;
use listsync_core::registry::BackendRegistry;
use listsync_core::traits::{Cache, CacheFactory};
use listsync_core::{Error, Result};

use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Upper bound for connecting and for one FLUSHDB
const REDIS_TIMEOUT: Duration = Duration::from_secs(5);

/// Cache backed by a Redis database
pub struct RedisCache {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCache {
    /// Create a cache for the database at `url`
    ///
    /// Only the URL is checked here; no connection is made.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::config(format!("Invalid Redis URL {}: {}", url, e)))?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    async fn connect(&self) -> Result<MultiplexedConnection> {
        let connecting = self.client.get_multiplexed_async_connection();
        match tokio::time::timeout(REDIS_TIMEOUT, connecting).await {
            Ok(Ok(connection)) => Ok(connection),
            Ok(Err(e)) => Err(Error::cache(format!("Failed to connect to Redis: {}", e))),
            Err(_) => Err(Error::cache("Timed out connecting to Redis")),
        }
    }
}

#[async_trait::async_trait]
impl Cache for RedisCache {
    async fn flush_all(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        let mut connection = match slot.as_ref() {
            Some(connection) => connection.clone(),
            None => {
                let connection = self.connect().await?;
                *slot = Some(connection.clone());
                connection
            }
        };

        let flush = async {
            let reply: redis::RedisResult<()> =
                redis::cmd("FLUSHDB").query_async(&mut connection).await;
            reply
        };
        let outcome = match tokio::time::timeout(REDIS_TIMEOUT, flush).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::cache(format!("FLUSHDB failed: {}", e))),
            Err(_) => Err(Error::cache("Timed out waiting for FLUSHDB")),
        };

        if outcome.is_err() {
            *slot = None;
        } else {
            tracing::debug!("Redis cache flushed");
        }
        outcome
    }
}

/// Factory for the `redis` cache type
pub struct RedisCacheFactory;

impl CacheFactory for RedisCacheFactory {
    fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Cache>> {
        match config {
            CacheConfig::Redis { url } => Ok(Arc::new(RedisCache::new(url)?)),
            _ => Err(Error::config("Invalid config for Redis cache")),
        }
    }
}

/// Register the Redis cache with a registry
pub fn register(registry: &BackendRegistry) {
    registry.register_cache("redis", Box::new(RedisCacheFactory));
}
