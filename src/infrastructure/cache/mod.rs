//! Bounded single-flight cache shared by provider repositories
//!
//! One [`Cache`] is built per scan session and handed to every repository.
//! It combines:
//! - LRU eviction bounded by a fixed capacity (0 means unbounded)
//! - Type-erased values so repositories of any kind share one instance
//! - `get_and_lock`, which lets exactly one caller compute a missing key
//!   while concurrent callers for the same key wait for its result

mod lru;


pub use lru::{Inserted, LruStore};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex as KeyLock, OwnedMutexGuard};
use tracing::{debug, warn};

/// Type-erased cached value
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Result of [`Cache::get_and_lock`]
pub enum CacheLookup<'a, T> {
    /// The value was cached, no lock is held
    Hit(Arc<T>),
    /// The caller owns the key: compute the value, [`FetchGuard::put`] it,
    /// then drop or [`FetchGuard::unlock`] the guard
    Miss(FetchGuard<'a>),
}

impl<T> fmt::Debug for CacheLookup<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit(_) => f.write_str("Hit(..)"),
            Self::Miss(guard) => f.debug_tuple("Miss").field(guard).finish(),
        }
    }
}

/// Exclusive right to compute the value of one cache key
///
/// Dropping the guard releases the key, so waiting callers resume even
/// when the computation failed or panicked.
pub struct FetchGuard<'a> {
    cache: &'a Cache,
    key: String,
    lock: Option<OwnedMutexGuard<()>>,
}

impl FetchGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Store the computed value, returning the shared handle
    pub fn put<T: Any + Send + Sync>(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.cache.insert(self.key.clone(), value.clone());
        value
    }

    /// Release the key explicitly
    pub fn unlock(self) {}
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        // Release the lock before trying to collect it.
        self.lock.take();
        self.cache.release_key_lock(&self.key);
    }
}

impl fmt::Debug for FetchGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchGuard").field("key", &self.key).finish()
    }
}

/// Bounded, concurrency-safe cache with single-flight lookups
pub struct Cache {
    store: Mutex<LruStore<CacheValue>>,
    key_locks: DashMap<String, Arc<KeyLock<()>>>,
    counters: Counters,
}

impl Cache {
    /// Create a cache holding at most `capacity` entries, 0 meaning unbounded
    pub fn new(capacity: usize) -> Self {
        Self {
            store: Mutex::new(LruStore::new(capacity)),
            key_locks: DashMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn capacity(&self) -> usize {
        self.store.lock().capacity()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Read a value, marking the key as recently used
    ///
    /// A value stored under another type reads as a miss.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.lookup(key);
        self.record(value.is_some());
        value
    }

    /// Read the type-erased value of a key
    pub fn get_raw(&self, key: &str) -> Option<CacheValue> {
        let value = self.store.lock().get(key);
        self.record(value.is_some());
        value
    }

    /// Insert or replace a value, returning whether the key already existed
    pub fn put<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> bool {
        self.insert(key.into(), Arc::new(value))
    }

    /// Insert an already shared value
    pub fn put_arc<T: Any + Send + Sync>(&self, key: impl Into<String>, value: Arc<T>) -> bool {
        self.insert(key.into(), value)
    }

    /// Look a key up, taking ownership of its computation on a miss
    ///
    /// A cached key is returned without locking. Otherwise the first caller
    /// receives [`CacheLookup::Miss`] while later callers for the same key
    /// wait until that guard is released, then re-check the cache: they get
    /// the stored value, or become the new owner when nothing was stored.
    pub async fn get_and_lock<T: Any + Send + Sync>(&self, key: &str) -> CacheLookup<'_, T> {
        if let Some(value) = self.lookup::<T>(key) {
            self.record(true);
            return CacheLookup::Hit(value);
        }

        // Declared before the handle so a cancelled wait still collects it.
        let _waiting = KeyWait { cache: self, key };
        let key_lock = Arc::clone(&self.key_locks.entry(key.to_string()).or_default());
        let lock = key_lock.lock_owned().await;

        if let Some(value) = self.lookup::<T>(key) {
            drop(lock);
            self.record(true);
            return CacheLookup::Hit(value);
        }

        self.record(false);
        debug!(key, "cache miss, computing value");
        CacheLookup::Miss(FetchGuard {
            cache: self,
            key: key.to_string(),
            lock: Some(lock),
        })
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Number of keys currently holding a lock handle
    pub fn pending_keys(&self) -> usize {
        self.key_locks.len()
    }

    fn lookup<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.store.lock().get(key)?;
        match value.downcast::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    key,
                    expected = std::any::type_name::<T>(),
                    "cached value has an unexpected type, treating as a miss"
                );
                None
            }
        }
    }

    fn insert(&self, key: String, value: CacheValue) -> bool {
        let inserted = self.store.lock().put(key, value);
        if let Some(evicted) = inserted.evicted {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %evicted, "evicted least recently used cache entry");
        }
        inserted.overridden
    }

    fn record(&self, hit: bool) {
        let counter = if hit {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop the lock handle of a key once nobody holds or awaits it
    fn release_key_lock(&self, key: &str) {
        self.key_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Collects a key's lock handle when a waiter leaves `get_and_lock`
///
/// A no-op while a [`FetchGuard`] still holds the lock.
struct KeyWait<'a> {
    cache: &'a Cache,
    key: &'a str,
}

impl Drop for KeyWait<'_> {
    fn drop(&mut self) {
        self.cache.release_key_lock(self.key);
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("pending_keys", &self.pending_keys())
            .finish()
    }
}
