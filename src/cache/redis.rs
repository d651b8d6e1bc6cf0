//! Redis-backed gate cache, shared across processes.

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::{CacheError, GateCache, MAX_TTL};
use crate::ratelimit::GateKey;

const KEY_PREFIX: &str = "withlimits:";

/// A [`GateCache`] storing flags in Redis with `SET .. EX`.
#[derive(Clone)]
pub struct RedisCache {
    redis: Arc<RedisClient>,
}

impl RedisCache {
    /// Connect lazily to the Redis server at `url`.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client = RedisClient::open(url).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: RedisClient) -> Self {
        Self {
            redis: Arc::new(client),
        }
    }

    fn redis_key(key: &GateKey) -> String {
        format!("{}{}", KEY_PREFIX, key.to_cache_key())
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl GateCache for RedisCache {
    async fn put(&self, key: &GateKey, value: bool, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;

        // Redis rejects EX 0.
        let seconds = ttl.min(MAX_TTL).as_secs().max(1);
        let redis_key = Self::redis_key(key);
        trace!(key = %redis_key, value, seconds, "Storing gate state in Redis");

        let _: () = conn
            .set_ex(redis_key, if value { "1" } else { "0" }, seconds)
            .await
            .map_err(|e| CacheError::Operation(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &GateKey, default: bool) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;

        let stored: Option<String> = conn
            .get(Self::redis_key(key))
            .await
            .map_err(|e| CacheError::Operation(e.to_string()))?;

        Ok(match stored.as_deref() {
            Some("1") => true,
            Some("0") => false,
            _ => default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_key_is_prefixed() {
        let key = GateKey::new("github", "/users");
        assert_eq!(RedisCache::redis_key(&key), "withlimits:6:github|/users");
    }

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(matches!(
            RedisCache::open("not-a-redis-url"),
            Err(CacheError::Unavailable(_))
        ));
    }
}
