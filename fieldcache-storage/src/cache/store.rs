//! The key/value store contract that field accessors read and write.
//!
//! A store holds raw text under string keys with optional expiry. It knows
//! nothing about fields or types; encoding and decoding happen in the
//! accessor.

use std::time::Duration;

use fieldcache_core::FieldCacheResult;

/// Key/value store with optional per-entry TTL.
///
/// Implementations must be thread-safe. All methods block until the backend
/// has finished the operation.
///
/// # Expiry
///
/// An entry written with `ttl = Some(d)` must read as absent once `d` has
/// elapsed. `ttl = None` means the store's own default (possibly "never").
pub trait CacheStore: Send + Sync {
    /// Get the raw value stored under `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> FieldCacheResult<Option<String>>;

    /// Store `raw` under `key`, replacing any prior value.
    fn set(&self, key: &str, raw: &str, ttl: Option<Duration>) -> FieldCacheResult<()>;

    /// Remove `key`. Returns whether a live entry was removed.
    fn delete(&self, key: &str) -> FieldCacheResult<bool>;

    /// Usage counters since the store was opened.
    fn stats(&self) -> FieldCacheResult<CacheStats>;
}

/// Statistics about store usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that found a live entry.
    pub hits: u64,
    /// Reads that found nothing (including expired entries).
    pub misses: u64,
    /// Successful `set` calls.
    pub writes: u64,
    /// Number of entries currently held, expired ones included until purged.
    pub entry_count: u64,
    /// Entries found expired and dropped on read.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
