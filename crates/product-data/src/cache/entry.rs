use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::LookupResult;

/// Current layout version of stored entries.
///
/// Entries written with any other version are treated as misses.
pub(crate) const STORAGE_VERSION: u32 = 1;

/// What is cached for a GTIN.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CachedPayload {
    /// A positive lookup result.
    Product(LookupResult),
    /// Tombstone: every source confirmed it does not know the GTIN.
    NotFound { message: String },
}

impl CachedPayload {
    pub fn from_result(result: &LookupResult) -> Self {
        if result.found {
            Self::Product(LookupResult {
                from_cache: false,
                ..result.clone()
            })
        } else {
            Self::NotFound {
                message: result.message.clone(),
            }
        }
    }

    /// Rebuild the caller-facing result for `gtin`.
    pub fn into_result(self, gtin: &str) -> LookupResult {
        match self {
            Self::Product(result) => result,
            Self::NotFound { message } => LookupResult::not_found(gtin, message),
        }
    }
}

/// A live cache entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    /// Normalized GTIN.
    pub key: String,
    pub payload: CachedPayload,
    /// When the entry was written.
    pub fetched_at: DateTime<Utc>,
}

/// Serialized form of an entry.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    pub version: u32,
    pub fetched_at: DateTime<Utc>,
    pub payload: CachedPayload,
}
