use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

type Payload = Arc<dyn Any + Send + Sync>;

/// Cache entry with expiration tracking
#[derive(Clone)]
pub struct CacheEntry {
    pub key: String,
    payload: Payload,
    pub created_at: Instant,
    pub ttl: Duration,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn new<T: Send + Sync + 'static>(key: impl Into<String>, value: T, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            payload: Arc::new(value),
            created_at: Instant::now(),
            ttl,
            access_count: 0,
        }
    }

    /// An entry is valid while `now - created_at < ttl`.
    pub fn is_valid(&self) -> bool {
        self.created_at.elapsed() < self.ttl
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid()
    }

    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("created_at", &self.created_at)
            .field("ttl", &self.ttl)
            .field("access_count", &self.access_count)
            .finish_non_exhaustive()
    }
}

/// Cache statistics for monitoring and optimization
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }
}

/// Configuration for cache behavior
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Process-wide memo cache keyed by string with a TTL per entry.
///
/// Payloads are type-erased; `get::<T>` only returns a value when the entry
/// was stored as a `T`. Capacity is bounded with LRU eviction. Clones share
/// the same underlying storage.
#[derive(Clone)]
pub struct CacheStore {
    entries: Arc<Mutex<LruCache<String, CacheEntry>>>,
    stats: Arc<RwLock<CacheStats>>,
    config: CacheConfig,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            stats: Arc::new(RwLock::new(CacheStats::default())),
            config,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(CacheConfig {
            max_entries: capacity,
            ..Default::default()
        })
    }

    /// Look up `key`. Expired entries are purged and reported as absent.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock();
        let mut stats = self.stats.write();

        let Some(entry) = entries.get_mut(key) else {
            stats.record_miss();
            return None;
        };

        if entry.is_expired() {
            entries.pop(key);
            stats.record_expiration();
            stats.record_miss();
            stats.total_entries = entries.len();
            debug!("Cache entry expired: {}", key);
            return None;
        }

        entry.access_count += 1;
        match entry.payload::<T>() {
            Some(value) => {
                stats.record_hit();
                Some(value.clone())
            }
            None => {
                debug!("Cache entry {} holds a different payload type", key);
                stats.record_miss();
                None
            }
        }
    }

    /// Store `value` under `key` and hand it back.
    pub fn set<T>(&self, key: &str, value: T, ttl: Duration) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = CacheEntry::new(key, value.clone(), ttl);
        let mut entries = self.entries.lock();
        let mut stats = self.stats.write();

        if let Some((evicted, _)) = entries.push(key.to_string(), entry) {
            if evicted != key {
                stats.record_eviction();
            }
        }

        stats.total_entries = entries.len();
        value
    }

    pub fn set_default<T>(&self, key: &str, value: T) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        self.set(key, value, self.config.default_ttl)
    }

    /// Drop `key`. Returns whether an entry was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        let mut stats = self.stats.write();

        let removed = entries.pop(key).is_some();
        stats.total_entries = entries.len();
        removed
    }

    /// Drop every key starting with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock();
        let mut stats = self.stats.write();

        let keys: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            entries.pop(key);
        }

        stats.total_entries = entries.len();
        keys.len()
    }

    /// Clear all entries from cache
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let mut stats = self.stats.write();

        entries.clear();
        stats.total_entries = 0;
    }

    /// Clean up expired entries
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let mut stats = self.stats.write();

        let expired_keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            entries.pop(&key);
            stats.record_expiration();
        }

        stats.total_entries = entries.len();
        count
    }

    /// Whether a valid entry exists for `key`. Does not touch LRU order.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().peek(key).map_or(false, CacheEntry::is_valid)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
