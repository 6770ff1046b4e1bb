//! In-memory TTL cache with size-bounded, oldest-first eviction.
//!
//! Backs the Streaming Dispatcher's response cache ([`crate::stream`]) and any
//! other component that needs a `CacheEntry{key, value, createdAt, expiresAt}`
//! table without external storage.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Cache, CacheError};

struct Entry<V> {
    value: V,
    created_at: Instant,
    expires_at: Option<Instant>,
    seq: u64,
}

/// In-memory cache keyed by `K`, values cloned out on read. Eviction runs
/// inline on access: expired entries are dropped first, then (if still over
/// `max_entries`) the oldest-inserted entries are dropped until the bound is
/// satisfied.
pub struct InMemoryCache<K, V> {
    inner: Arc<RwLock<HashMap<K, Entry<V>>>>,
    max_entries: usize,
    next_seq: std::sync::atomic::AtomicU64,
}

impl<K, V> InMemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            max_entries,
            next_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    async fn evict_locked(map: &mut HashMap<K, Entry<V>>, max_entries: usize) {
        let now = Instant::now();
        map.retain(|_, e| e.expires_at.map(|exp| exp > now).unwrap_or(true));

        if map.len() > max_entries {
            let mut by_seq: Vec<(K, u64)> = map.iter().map(|(k, e)| (k.clone(), e.seq)).collect();
            by_seq.sort_by_key(|(_, seq)| *seq);
            let overflow = map.len() - max_entries;
            for (k, _) in by_seq.into_iter().take(overflow) {
                map.remove(&k);
            }
        }
    }
}

impl<K, V> Default for InMemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for InMemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Option<V> {
        let guard = self.inner.read().await;
        let entry = guard.get(key)?;
        if let Some(expires_at) = entry.expires_at {
            if expires_at <= Instant::now() {
                return None;
            }
        }
        Some(entry.value.clone())
    }

    async fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let seq = self.next_seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut guard = self.inner.write().await;
        guard.insert(
            key,
            Entry {
                value,
                created_at: Instant::now(),
                expires_at: ttl.map(|d| Instant::now() + d),
                seq,
            },
        );
        let max_entries = self.max_entries;
        Self::evict_locked(&mut guard, max_entries).await;
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), CacheError> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.inner.write().await.clear();
        Ok(())
    }
}
