#![allow(clippy::multiple_bound_locations)]
//! Caching layer for block data fetched from the node
//!
//! Block bodies, headers and timestamps are immutable for a given block hash, so a
//! [`CachedLedger`] can answer repeated scans over the same range without
//! changing what they observe. Height-to-hash lookups and the chain head are
//! always forwarded to the node.
use crate::error::Result;
use crate::ledger::{BlockBody, BlockHash, BlockHeader, LedgerClient};
use async_trait::async_trait;
use lru::LruCache;
use std::hash::Hash;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A trait for generic cache operations.
/// It uses `std::borrow::Borrow` to allow getting/removing elements without cloning the key.
pub trait CacheInner<K, V> {
    /// Retrieve a value from the cache without mutating the cache's state (e.g., LruCache promotion).
    fn get_non_mut<Q: ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq;

    /// Insert a value into the cache.
    fn put(&mut self, key: K, value: V);

    /// Get the number of entries in the cache.
    fn len(&self) -> usize;

    /// Check if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> CacheInner<K, V> for LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn get_non_mut<Q: ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq,
    {
        self.peek(key)
    }

    fn put(&mut self, key: K, value: V) {
        self.put(key, value);
    }

    fn len(&self) -> usize {
        self.len()
    }
}

/// Generic, thread-safe cache wrapper using RwLock.
pub struct ThreadSafeCache<K, V, T: CacheInner<K, V>> {
    cache: Arc<RwLock<T>>,
    _phantom_k: PhantomData<K>,
    _phantom_v: PhantomData<V>,
}

impl<K, V> ThreadSafeCache<K, V, LruCache<K, V>>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new LRU cache with specified capacity. Zero is treated as one.
    pub fn new_lru(capacity: usize) -> Self {
        let capacity_nz = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity_nz))),
            _phantom_k: PhantomData,
            _phantom_v: PhantomData,
        }
    }

    /// Get current capacity of the LRU cache.
    pub async fn capacity(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cap().get()
    }
}

impl<K, V, T: CacheInner<K, V>> ThreadSafeCache<K, V, T>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Get a value from cache. Uses read lock for non-mutating access.
    pub async fn get<Q: ?Sized>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq,
    {
        let cache = self.cache.read().await;
        cache.get_non_mut(key).cloned()
    }

    /// Put a value in cache. Uses write lock.
    pub async fn put(&self, key: K, value: V) {
        let mut cache = self.cache.write().await;
        cache.put(key, value);
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }
}

impl<K, V, T: CacheInner<K, V>> Clone for ThreadSafeCache<K, V, T> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            _phantom_k: PhantomData,
            _phantom_v: PhantomData,
        }
    }
}

/// Cache for block bodies keyed by block hash
pub type BlockCache = ThreadSafeCache<BlockHash, BlockBody, LruCache<BlockHash, BlockBody>>;

impl BlockCache {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        Self::new_lru(capacity)
    }

    pub async fn stats(&self) -> (usize, usize) {
        (self.len().await, self.capacity().await)
    }
}

/// Cache for block headers keyed by block hash
pub type HeaderCache = ThreadSafeCache<BlockHash, BlockHeader, LruCache<BlockHash, BlockHeader>>;

impl HeaderCache {
    pub fn new(capacity: usize) -> Self {
        Self::new_lru(capacity)
    }
}

/// Cache for block timestamps keyed by block hash
pub type TimestampCache = ThreadSafeCache<BlockHash, u64, LruCache<BlockHash, u64>>;

impl TimestampCache {
    pub fn new(capacity: usize) -> Self {
        Self::new_lru(capacity)
    }
}

/// [`LedgerClient`] decorator that memoizes per-hash block data.
pub struct CachedLedger {
    inner: Arc<dyn LedgerClient>,
    pub bodies: BlockCache,
    pub headers: HeaderCache,
    pub timestamps: TimestampCache,
}

impl CachedLedger {
    pub fn new(inner: Arc<dyn LedgerClient>, capacity: usize) -> Self {
        Self {
            inner,
            bodies: BlockCache::new(capacity),
            headers: HeaderCache::new(capacity),
            timestamps: TimestampCache::new(capacity),
        }
    }
}

#[async_trait]
impl LedgerClient for CachedLedger {
    async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    async fn head_number(&self) -> Result<u64> {
        self.inner.head_number().await
    }

    async fn hash_for(&self, number: u64) -> Result<BlockHash> {
        self.inner.hash_for(number).await
    }

    async fn header_for(&self, hash: &str) -> Result<BlockHeader> {
        if let Some(header) = self.headers.get(hash).await {
            return Ok(header);
        }
        let header = self.inner.header_for(hash).await?;
        self.headers.put(hash.to_string(), header.clone()).await;
        Ok(header)
    }

    async fn body_for(&self, hash: &str) -> Result<BlockBody> {
        if let Some(body) = self.bodies.get(hash).await {
            return Ok(body);
        }
        let body = self.inner.body_for(hash).await?;
        self.bodies.put(hash.to_string(), body.clone()).await;
        Ok(body)
    }

    async fn timestamp_for(&self, hash: &str) -> Result<u64> {
        if let Some(timestamp) = self.timestamps.get(hash).await {
            return Ok(timestamp);
        }
        let timestamp = self.inner.timestamp_for(hash).await?;
        self.timestamps.put(hash.to_string(), timestamp).await;
        Ok(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryLedger;

    #[tokio::test]
    async fn test_block_cache_lru_eviction() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let cache = BlockCache::new(2);
            let body = |number| BlockBody {
                number,
                header_size: 98,
                operations: vec![],
            };

            cache.put("0x00".to_string(), body(0)).await;
            cache.put("0x01".to_string(), body(1)).await;
            cache.put("0x02".to_string(), body(2)).await;

            let (size, cap) = cache.stats().await;
            assert_eq!(size, 2);
            assert_eq!(cap, 2);
            assert!(cache.get("0x00").await.is_none());
            assert_eq!(cache.get("0x02").await.map(|b| b.number), Some(2));
        })
        .await
        .expect("test_block_cache_lru_eviction timed out");
    }

    #[tokio::test]
    async fn test_cached_ledger_fetches_each_hash_once() {
        let ledger = Arc::new(MemoryLedger::with_empty_blocks(3));
        let cached = CachedLedger::new(ledger.clone(), 16);

        for _ in 0..2 {
            let hash = cached.hash_for(1).await.unwrap();
            let body = cached.body_for(&hash).await.unwrap();
            assert_eq!(body.number, 1);
            cached.timestamp_for(&hash).await.unwrap();
            assert_eq!(cached.header_for(&hash).await.unwrap().number, 1);
        }

        let calls = ledger.calls();
        assert_eq!(calls.hash_for, 2);
        assert_eq!(calls.body_for, 1);
        assert_eq!(calls.header_for, 1);
        assert_eq!(calls.timestamp_for, 1);
    }

    #[tokio::test]
    async fn test_cached_ledger_does_not_cache_failures() {
        let ledger = Arc::new(MemoryLedger::with_empty_blocks(2));
        let cached = CachedLedger::new(ledger.clone(), 16);
        let hash = cached.hash_for(0).await.unwrap();

        ledger.set_offline(true);
        assert!(cached.body_for(&hash).await.is_err());
        ledger.set_offline(false);
        assert!(cached.body_for(&hash).await.is_ok());
        assert!(!cached.bodies.is_empty().await);
    }
}
