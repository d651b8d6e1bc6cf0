//! In-memory gate cache.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use super::{CacheError, GateCache, MAX_TTL};
use crate::ratelimit::GateKey;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: bool,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A process-local [`GateCache`].
///
/// Expiry is measured with tokio's clock, so a paused test runtime controls
/// it. TTLs longer than [`MAX_TTL`] are clamped to it. Expired entries are
/// dropped when read or by [`MemoryCache::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<GateKey, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time left before the entry under `key` expires.
    ///
    /// Returns `None` if there is no live entry.
    pub fn ttl(&self, key: &GateKey) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }
}

#[async_trait]
impl GateCache for MemoryCache {
    async fn put(&self, key: &GateKey, value: bool, ttl: Duration) -> Result<(), CacheError> {
        let ttl = ttl.min(MAX_TTL);
        let expires_at = Instant::now() + ttl;
        trace!(key = %key, value, ttl_secs = ttl.as_secs(), "Storing gate state");
        self.entries.insert(key.clone(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &GateKey, default: bool) -> Result<bool, CacheError> {
        let now = Instant::now();

        // The read guard must be released before removing.
        let live = self.entries.get(key).map(|entry| (entry.is_live(now), entry.value));

        match live {
            Some((true, value)) => Ok(value),
            Some((false, _)) => {
                self.entries.remove_if(key, |_, entry| !entry.is_live(now));
                Ok(default)
            }
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> GateKey {
        GateKey::new("github", "/users")
    }

    #[tokio::test]
    async fn test_get_default_when_absent() {
        let cache = MemoryCache::new();
        assert!(!cache.get(&key(), false).await.unwrap());
        assert!(cache.get(&key(), true).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires() {
        let cache = MemoryCache::new();
        cache.put(&key(), true, Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(&key(), false).await.unwrap());
        assert_eq!(cache.ttl(&key()), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.get(&key(), false).await.unwrap());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_overwrites_ttl() {
        let cache = MemoryCache::new();
        cache.put(&key(), true, Duration::from_secs(10)).await.unwrap();
        cache.put(&key(), true, Duration::from_secs(30)).await.unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(cache.get(&key(), false).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_never_live() {
        let cache = MemoryCache::new();
        cache.put(&key(), true, Duration::ZERO).await.unwrap();
        assert!(!cache.get(&key(), false).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_ttl_is_clamped() {
        let cache = MemoryCache::new();
        cache.put(&key(), true, Duration::MAX).await.unwrap();

        assert_eq!(cache.ttl(&key()), Some(MAX_TTL));
        tokio::time::advance(Duration::from_secs(86400 * 365)).await;
        assert!(cache.get(&key(), false).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.put(&key(), true, Duration::from_secs(1)).await.unwrap();
        cache
            .put(&GateKey::new("github", "/search"), true, Duration::from_secs(120))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.ttl(&key()), None);
    }
}
