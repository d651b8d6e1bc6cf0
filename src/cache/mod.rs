//! Storage for gate state.
//!
//! Gates keep a single "blocked" flag per endpoint with an expiry. Storage is
//! injected so gates can share state in-process ([`MemoryCache`]) or across
//! processes (`RedisCache`, behind the `redis` feature).

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::ratelimit::GateKey;

/// Longest expiry a backend stores; longer TTLs are clamped to it.
///
/// Servers may advertise windows up to `u64::MAX` seconds, which no clock
/// can represent.
pub const MAX_TTL: Duration = Duration::from_secs(86400 * 365 * 30);

/// Errors raised by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation failed: {0}")]
    Operation(String),
}

/// Trait for key/value stores with per-entry expiry.
#[async_trait]
pub trait GateCache: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl`.
    async fn put(&self, key: &GateKey, value: bool, ttl: Duration) -> Result<(), CacheError>;

    /// Read the value under `key`, or `default` if absent or expired.
    async fn get(&self, key: &GateKey, default: bool) -> Result<bool, CacheError>;
}
