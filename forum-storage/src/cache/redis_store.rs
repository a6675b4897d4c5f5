//! Shared cache store backed by Redis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use forum_core::{CacheError, DataConfig};
use redis::AsyncCommands;

use super::memory::MemoryCacheStore;
use super::traits::CacheStore;

/// Redis store using a `deadpool-redis` connection pool.
///
/// Values are written with `SET key value EX ttl`. Redis rejects a zero
/// expiry, so sub-second TTLs are rounded up to one second.
#[derive(Clone)]
pub struct RedisCacheStore {
    pool: Pool,
}

impl RedisCacheStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool for `url`. Does not open a connection.
    pub fn from_url(url: &str) -> Result<Self, CacheError> {
        let pool = deadpool_redis::Config::from_url(url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable {
                reason: format!("failed to create Redis pool: {}", e),
            })?;
        Ok(Self::new(pool))
    }

    /// Check out a connection, for health checks.
    pub async fn ping(&self) -> Result<(), CacheError> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool.get().await.map_err(|e| CacheError::Unavailable {
            reason: format!("failed to get Redis connection: {}", e),
        })
    }
}

fn command_error(command: &str, key: &str, e: redis::RedisError) -> CacheError {
    CacheError::Unavailable {
        reason: format!("Redis {} {} failed: {}", command, key, e),
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| command_error("GET", key, e))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| command_error("SET", key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| command_error("DEL", key, e))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Pick the cache store for a configuration.
///
/// Without `redis_url` the process-local store is used. With one, the Redis
/// store is always returned: other instances purge through it, so a private
/// fallback would serve stale entries. An unreachable server only costs a
/// warning here; reads become misses until it is back.
pub async fn connect_store(config: &DataConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    let Some(url) = config.redis_url.as_deref() else {
        tracing::info!("no Redis URL configured, using process-local cache");
        return Ok(Arc::new(MemoryCacheStore::new()));
    };

    let store = RedisCacheStore::from_url(url)?;
    match store.ping().await {
        Ok(()) => tracing::info!("connected to Redis cache store"),
        Err(e) => tracing::warn!(error = %e, "Redis unreachable at startup, serving reads from the store"),
    }
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheFacade, ScopeKeyRegistry};
    use forum_core::{EntityType, Scope};

    #[tokio::test]
    async fn test_connect_store_without_url_is_local() {
        let store = connect_store(&DataConfig::default()).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_kept_and_reads_miss() {
        let config = DataConfig {
            redis_url: Some("redis://127.0.0.1:1/".to_string()),
            ..DataConfig::default()
        };
        let store = connect_store(&config).await.unwrap();
        assert_eq!(store.name(), "redis");

        let registry = ScopeKeyRegistry::standard(config.default_ttl).unwrap();
        let facade = CacheFacade::new(store, Arc::new(registry));
        let key = facade.key(EntityType::Profile, Scope::Summary, 1).unwrap();

        assert_eq!(facade.get::<i64>(&key).await, None);
        facade.set_int(&key, 1).await;
        facade.delete(&key).await;
        assert!(facade.stats().errors >= 3);
    }

    #[tokio::test]
    async fn test_malformed_redis_url_is_an_error() {
        let config = DataConfig {
            redis_url: Some("not a url".to_string()),
            ..DataConfig::default()
        };
        assert!(matches!(
            connect_store(&config).await,
            Err(CacheError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_from_url_rejects_garbage() {
        assert!(matches!(
            RedisCacheStore::from_url("not a url"),
            Err(CacheError::Unavailable { .. })
        ));
    }
}
