//! In-process cache backend with LRU eviction and per-key expiry.
//!
//! Useful for tests and single-node deployments. The lock is only ever held
//! for the duration of a map update; no await happens while it is held.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::backend::CacheBackend;
use crate::error::BackendResult;
use crate::expiry::ExpiryTracker;

/// Default maximum number of entries held in memory.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Inner state protected by a mutex.
struct MemoryInner {
    /// LRU map of stored values.
    lru: LruCache<String, Vec<u8>>,

    /// Per-key deadlines.
    expiry: ExpiryTracker,
}

impl MemoryInner {
    /// Drop `key` if its deadline has passed. Returns true if it was dropped.
    fn evict_if_expired(&mut self, key: &str) -> bool {
        if self.lru.contains(key) && self.expiry.is_expired(key) {
            self.lru.pop(key);
            self.expiry.remove(key);
            true
        } else {
            false
        }
    }
}

/// Operation counters, mostly useful for asserting traffic in tests.
#[derive(Debug, Default)]
struct Counters {
    gets: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

/// In-memory [`CacheBackend`].
///
/// Cloning is cheap and clones share the same storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
    counters: Arc<Counters>,
    max_entries: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a backend holding up to [`DEFAULT_MAX_ENTRIES`] entries.
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create a backend with an explicit capacity.
    ///
    /// When full, the least recently used entry is evicted.
    pub fn with_max_entries(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);

        let inner = MemoryInner {
            lru: LruCache::new(cap),
            expiry: ExpiryTracker::new(),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
            counters: Arc::new(Counters::default()),
            max_entries: cap.get(),
        }
    }

    /// Number of stored entries, including ones not yet swept after expiry.
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    /// Check if the backend holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Check if a live (non-expired) entry exists, without touching LRU order.
    pub fn contains(&self, key: &str) -> bool {
        let inner = self.inner.lock();
        inner.lru.contains(key) && !inner.expiry.is_expired(key)
    }

    /// Remove all expired entries. Returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let expired = inner.expiry.drain_expired();
        let count = expired.len();

        for key in expired {
            inner.lru.pop(&key);
        }

        if count > 0 {
            debug!(count = count, "Cleaned up expired entries");
        }

        count
    }

    /// Get backend statistics.
    pub fn stats(&self) -> MemoryStats {
        let size = self.inner.lock().lru.len();
        MemoryStats {
            size,
            capacity: self.max_entries,
            gets: self.counters.gets.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();

        if inner.evict_if_expired(key) {
            trace!(key = %key, "Entry expired");
            return Ok(None);
        }

        Ok(inner.lru.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();

        if let Some((evicted, _)) = inner.lru.push(key.to_string(), value.to_vec())
            && evicted != key
        {
            debug!(key = %evicted, "Evicting LRU entry to make room");
            inner.expiry.remove(&evicted);
        }
        inner.expiry.set(key, ttl);

        trace!(key = %key, bytes = value.len(), ttl_secs = ttl.as_secs(), "Entry stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        inner.lru.pop(key);
        inner.expiry.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BackendResult<Vec<String>> {
        let inner = self.inner.lock();
        Ok(inner
            .lru
            .iter()
            .filter(|(key, _)| !inner.expiry.is_expired(key))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

/// Memory backend statistics.
#[derive(Debug, Clone)]
pub struct MemoryStats {
    /// Current number of stored entries.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Number of `get` calls served.
    pub gets: u64,

    /// Number of `set` calls served.
    pub sets: u64,

    /// Number of `delete` calls served.
    pub deletes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_and_get() {
        let backend = MemoryBackend::new();

        backend.set("key-1", b"value", TTL).await.unwrap();

        let value = backend.get("key-1").await.unwrap();
        assert_eq!(value.as_deref(), Some(&b"value"[..]));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let backend = MemoryBackend::new();

        backend.set("key-1", b"first", TTL).await.unwrap();
        backend.set("key-1", b"second", TTL).await.unwrap();

        assert_eq!(backend.get("key-1").await.unwrap().as_deref(), Some(&b"second"[..]));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let backend = MemoryBackend::new();

        backend.set("key-1", b"value", TTL).await.unwrap();
        backend.delete("key-1").await.unwrap();
        backend.delete("key-1").await.unwrap();
        backend.delete("never-existed").await.unwrap();

        assert_eq!(backend.get("key-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let backend = MemoryBackend::with_max_entries(3);

        for i in 1..=3 {
            backend.set(&format!("key-{}", i), b"v", TTL).await.unwrap();
        }

        // Touch key-1 so key-2 becomes least recently used
        let _ = backend.get("key-1").await.unwrap();

        backend.set("key-4", b"v", TTL).await.unwrap();

        assert_eq!(backend.len(), 3);
        assert!(backend.contains("key-1"));
        assert!(!backend.contains("key-2"));
        assert!(backend.contains("key-3"));
        assert!(backend.contains("key-4"));
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let backend = MemoryBackend::new();

        backend
            .set("key-1", b"value", Duration::from_millis(50))
            .await
            .unwrap();
        assert!(backend.contains("key-1"));

        sleep(Duration::from_millis(100)).await;

        assert!(!backend.contains("key-1"));
        assert_eq!(backend.get("key-1").await.unwrap(), None);
        // Expired entry is dropped on access
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_huge_ttl_stores_entry() {
        let backend = MemoryBackend::new();

        backend.set("key-1", b"value", Duration::MAX).await.unwrap();

        assert!(backend.contains("key-1"));
        assert_eq!(backend.get("key-1").await.unwrap().as_deref(), Some(&b"value"[..]));
        assert_eq!(backend.cleanup_expired(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let backend = MemoryBackend::new();

        for i in 1..=3 {
            backend
                .set(&format!("key-{}", i), b"v", Duration::from_millis(50))
                .await
                .unwrap();
        }
        backend.set("survivor", b"v", TTL).await.unwrap();

        sleep(Duration::from_millis(100)).await;

        assert_eq!(backend.cleanup_expired(), 3);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_list_keys_skips_expired() {
        let backend = MemoryBackend::new();

        backend.set("live", b"v", TTL).await.unwrap();
        backend
            .set("stale", b"v", Duration::from_millis(10))
            .await
            .unwrap();

        sleep(Duration::from_millis(30)).await;

        assert_eq!(backend.list_keys().await.unwrap(), vec!["live".to_string()]);
    }

    #[tokio::test]
    async fn test_stats_count_operations() {
        let backend = MemoryBackend::with_max_entries(100);

        backend.set("key-1", b"v", TTL).await.unwrap();
        let _ = backend.get("key-1").await.unwrap();
        let _ = backend.get("key-2").await.unwrap();
        backend.delete("key-1").await.unwrap();

        let stats = backend.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.capacity, 100);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.deletes, 1);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let backend = MemoryBackend::new();
        let other = backend.clone();

        backend.set("key-1", b"v", TTL).await.unwrap();

        assert!(other.contains("key-1"));
    }
}
