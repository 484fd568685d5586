//! Bounded get-or-load-once caches for raster data.
//!
//! Both cache levels of the elevation engine share one contract: a bounded
//! LRU of loaded values, a permanent set of keys known to have no value
//! (missing backing files, all-nodata tiles), and a single-flight guarantee
//! that at most one caller performs the load for any key.

pub mod loading_cache;
pub mod stats;

pub use loading_cache::{Loaded, LoadingCache};
pub use stats::CacheStats;
