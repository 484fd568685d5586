//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one cache instance.
///
/// All fields are atomic for lock-free reads from metrics endpoints. The
/// core never reports to a process-wide singleton; each cache owns its
/// stats and callers read them through the owning cache.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered from the loaded-value cache.
    pub hits: AtomicU64,
    /// Lookups that ran the loader.
    pub misses: AtomicU64,
    /// Lookups answered from the permanent-absent set.
    pub absent_hits: AtomicU64,
    /// Keys recorded as permanently absent.
    pub absent_recorded: AtomicU64,
    /// Values evicted to make room.
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Cache hit rate as a fraction (0.0 - 1.0), counting absent hits as
    /// hits since they also avoid a load.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) + self.absent_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn absent_hits(&self) -> u64 {
        self.absent_hits.load(Ordering::Relaxed)
    }

    pub fn absent_recorded(&self) -> u64 {
        self.absent_recorded.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
