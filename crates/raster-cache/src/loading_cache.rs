//! Bounded LRU cache with single-flight loading and permanent negative
//! results.
//!
//! One abstraction serves both cache levels of the engine:
//!
//! - the tile-set router caches open decoders per file-level tile
//!   coordinate, with `Absent` marking backing files that do not exist;
//! - each decoder caches decoded sample arrays per in-file tile coordinate,
//!   with `Absent` marking tiles proven to be all no-data.
//!
//! `Absent` keys are remembered for the lifetime of the cache and carry no
//! payload, so they are never evicted. Loaded values live in a bounded LRU;
//! eviction hands ownership of the evicted `Arc` to a release callback
//! invoked exactly once, after which the key is no longer resolvable.
//!
//! ## Concurrency
//!
//! At most one caller runs the loader for any key. Concurrent callers for
//! the same key share one refcounted flight entry: they wait on its lock
//! and observe the result via a mandatory recheck after acquiring it. The
//! entry is unregistered only when the last holder is done with it, so a
//! caller retrying after a loader error, or arriving while others are
//! still waiting, always contends on the same lock and can never start a
//! second loader for the key. No cache-wide lock is held while a loader
//! runs, so loads for distinct keys proceed in parallel. A loader error is
//! reported only to the caller that ran it; waiters retry. If the loading
//! caller is cancelled, its flight guard drops and one waiter takes over
//! the load (detach-only cancellation); a cancelled load that nobody is
//! waiting on leaves no flight entry behind.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use lru::LruCache;
use tokio::sync::{Mutex, RwLock};

use dem_common::DemResult;

use crate::stats::CacheStats;

/// What a loader found for a key.
#[derive(Debug)]
pub enum Loaded<V> {
    /// A value to cache.
    Value(V),
    /// The key has no value, permanently.
    Absent,
}

type EvictFn<K, V> = Box<dyn Fn(&K, Arc<V>) + Send + Sync>;

/// One in-flight load, shared by every concurrent caller for its key.
struct Flight {
    lock: Mutex<()>,
    /// Mutated only while the flight map lock is held; atomic solely for
    /// interior mutability behind the `Arc`.
    holders: AtomicUsize,
}

/// Keeps the flight entry registered while a caller holds it; the last
/// guard to drop unregisters the entry, including on cancellation.
struct FlightGuard<'a, K>
where
    K: Eq + Hash,
{
    key: K,
    map: &'a StdMutex<HashMap<K, Arc<Flight>>>,
    flight: Arc<Flight>,
}

impl<K> Drop for FlightGuard<'_, K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        if self.flight.holders.fetch_sub(1, Ordering::Relaxed) == 1 {
            map.remove(&self.key);
        }
    }
}

/// A bounded, concurrent get-or-load-once cache.
pub struct LoadingCache<K, V> {
    entries: Mutex<LruCache<K, Arc<V>>>,
    absent: RwLock<HashSet<K>>,
    inflight: StdMutex<HashMap<K, Arc<Flight>>>,
    on_evict: Option<EvictFn<K, V>>,
    stats: Arc<CacheStats>,
}

impl<K, V> LoadingCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            absent: RwLock::new(HashSet::new()),
            inflight: StdMutex::new(HashMap::new()),
            on_evict: None,
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Like [`new`](Self::new), with a release callback that receives each
    /// evicted value exactly once.
    pub fn with_eviction<F>(capacity: NonZeroUsize, on_evict: F) -> Self
    where
        F: Fn(&K, Arc<V>) + Send + Sync + 'static,
    {
        Self {
            on_evict: Some(Box::new(on_evict)),
            ..Self::new(capacity)
        }
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Number of loaded values currently held (absent keys not counted).
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Get the value for `key`, running `loader` on a miss. Returns `None`
    /// when the key is known to have no value.
    pub async fn get_or_load<F, Fut>(&self, key: K, loader: F) -> DemResult<Option<Arc<V>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DemResult<Loaded<V>>>,
    {
        if let Some(found) = self.lookup(&key).await {
            return Ok(found);
        }

        // Miss: serialize on this key only.
        let flight = self.join_flight(key.clone());
        let _leader = flight.flight.lock.lock().await;

        // Another caller may have populated the cache while we waited.
        if let Some(found) = self.lookup(&key).await {
            return Ok(found);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        match loader().await {
            Ok(Loaded::Value(value)) => {
                let value = Arc::new(value);
                self.insert(key, Arc::clone(&value)).await;
                Ok(Some(value))
            }
            Ok(Loaded::Absent) => {
                self.absent.write().await.insert(key);
                self.stats.absent_recorded.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Register interest in the flight entry for `key`, creating it if no
    /// other caller currently holds one.
    fn join_flight(&self, key: K) -> FlightGuard<'_, K> {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        let flight = Arc::clone(inflight.entry(key.clone()).or_insert_with(|| {
            Arc::new(Flight {
                lock: Mutex::new(()),
                holders: AtomicUsize::new(0),
            })
        }));
        flight.holders.fetch_add(1, Ordering::Relaxed);
        FlightGuard {
            key,
            map: &self.inflight,
            flight,
        }
    }

    async fn lookup(&self, key: &K) -> Option<Option<Arc<V>>> {
        if self.absent.read().await.contains(key) {
            self.stats.absent_hits.fetch_add(1, Ordering::Relaxed);
            return Some(None);
        }
        if let Some(value) = self.entries.lock().await.get(key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Some(Some(Arc::clone(value)));
        }
        None
    }

    async fn insert(&self, key: K, value: Arc<V>) {
        let evicted = {
            let mut entries = self.entries.lock().await;
            match entries.push(key.clone(), value) {
                // push reports both LRU evictions and same-key replacement;
                // only the former releases a resource.
                Some((old_key, old_value)) if old_key != key => Some((old_key, old_value)),
                _ => None,
            }
        };
        if let Some((evicted_key, evicted_value)) = evicted {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                evictions = self.stats.evictions(),
                "evicted least recently used cache entry"
            );
            if let Some(on_evict) = &self.on_evict {
                on_evict(&evicted_key, evicted_value);
            }
        }
    }
}
