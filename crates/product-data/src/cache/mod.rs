//! Result cache keyed by normalized GTIN.
//!
//! The staleness rule lives here and nowhere else: an entry older than the
//! configured TTL is reported as absent but left in place until the next
//! write for the same key replaces it.

mod entry;
mod store;

pub use entry::{CacheEntry, CachedPayload};
pub use store::MemoryCacheStore;

use serde::Serialize;

/// Default key prefix for cached lookups.
pub const DEFAULT_CACHE_NAMESPACE: &str = "ciclik_api_cache_";

/// Storage for resolved lookups.
///
/// Methods are synchronous and must never block on I/O for long: they are
/// called on the lookup path and while coordinating concurrent lookups.
pub trait CacheStore: Send + Sync {
    /// Live entry for `key`, or `None` when absent or stale.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store `payload` under `key`, replacing any previous entry.
    fn put(&self, key: &str, payload: CachedPayload);

    /// Remove every entry.
    fn clear(&self);

    /// Entry count and approximate footprint, stale entries included.
    fn stats(&self) -> CacheStats;
}

/// Cache occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub size_bytes: usize,
}

impl CacheStats {
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}
