//! In-memory cache store holding serialized entries under namespaced keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};

use super::entry::{CacheEntry, CachedPayload, StoredEntry, STORAGE_VERSION};
use super::{CacheStats, CacheStore};
use crate::clock::{elapsed_between, Clock};

/// Thread-safe in-memory [`CacheStore`].
///
/// Entries are kept as JSON documents keyed by `<namespace><gtin>`, the same
/// layout a browser-side key-value store would hold, so size reporting
/// reflects the serialized footprint.
pub struct MemoryCacheStore {
    namespace: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new(namespace: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            namespace: namespace.into(),
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the entries mutex, recovering from poison if necessary.
    ///
    /// The map only ever holds complete serialized documents, so a poisoned
    /// lock still guards consistent data.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Cache store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    #[cfg(test)]
    fn put_raw(&self, key: &str, raw: &str) {
        self.lock_entries()
            .insert(self.storage_key(key), raw.to_string());
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let raw = self.lock_entries().get(&self.storage_key(key)).cloned()?;

        let stored: StoredEntry = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                debug!("Discarding unreadable cache entry for '{}': {}", key, e);
                return None;
            }
        };

        if stored.version != STORAGE_VERSION {
            debug!(
                "Discarding cache entry for '{}' with layout version {}",
                key, stored.version
            );
            return None;
        }

        let age = elapsed_between(stored.fetched_at, self.clock.now());
        if age > self.ttl {
            debug!("Cache entry for '{}' is stale ({:?} old)", key, age);
            return None;
        }

        debug!("Cache hit for '{}' ({:?} old)", key, age);
        Some(CacheEntry {
            key: key.to_string(),
            payload: stored.payload,
            fetched_at: stored.fetched_at,
        })
    }

    fn put(&self, key: &str, payload: CachedPayload) {
        let stored = StoredEntry {
            version: STORAGE_VERSION,
            fetched_at: self.clock.now(),
            payload,
        };

        match serde_json::to_string(&stored) {
            Ok(raw) => {
                self.lock_entries().insert(self.storage_key(key), raw);
                debug!("Cached lookup result for '{}'", key);
            }
            Err(e) => warn!("Failed to serialize cache entry for '{}': {}", key, e),
        }
    }

    fn clear(&self) {
        let mut entries = self.lock_entries();
        let removed = entries.len();
        entries.clear();
        info!("Cache cleared: {} entries removed", removed);
    }

    fn stats(&self) -> CacheStats {
        let entries = self.lock_entries();
        CacheStats {
            total: entries.len(),
            size_bytes: entries.iter().map(|(k, v)| k.len() + v.len()).sum(),
        }
    }
}
