//! In-memory cache store.
//!
//! Entries live in a `HashMap` behind a `RwLock`. Expiry is stored as a
//! deadline and enforced lazily: an expired entry is dropped the first time
//! someone reads it, or by [`InMemoryStore::purge_expired`].

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fieldcache_core::{FieldCacheResult, StoreError};

use super::store::{CacheStats, CacheStore};

#[derive(Debug, Clone)]
struct StoredEntry {
    raw: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Compute an absolute deadline. A TTL too large to represent never expires.
pub(crate) fn deadline_after(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    stats: RwLock<CacheStats>,
    default_ttl: Option<Duration>,
}

impl InMemoryStore {
    /// Create a store whose entries never expire unless a TTL is given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that applies `ttl` to writes that carry none.
    pub fn with_default_ttl(ttl: Duration) -> Self {
        Self {
            default_ttl: Some(ttl),
            ..Self::default()
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Number of held entries, expired ones included until purged.
    pub fn len(&self) -> FieldCacheResult<usize> {
        Ok(self.read_entries()?.len())
    }

    pub fn is_empty(&self) -> FieldCacheResult<bool> {
        Ok(self.read_entries()?.is_empty())
    }

    /// Drop every entry.
    pub fn clear(&self) -> FieldCacheResult<()> {
        self.write_entries()?.clear();
        Ok(())
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> FieldCacheResult<u64> {
        let now = Utc::now();
        let mut entries = self.write_entries()?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let purged = (before - entries.len()) as u64;
        drop(entries);

        if let Ok(mut stats) = self.stats.write() {
            stats.expirations += purged;
        }
        Ok(purged)
    }

    fn read_entries(
        &self,
    ) -> FieldCacheResult<std::sync::RwLockReadGuard<'_, HashMap<String, StoredEntry>>> {
        Ok(self.entries.read().map_err(|_| StoreError::LockPoisoned)?)
    }

    fn write_entries(
        &self,
    ) -> FieldCacheResult<std::sync::RwLockWriteGuard<'_, HashMap<String, StoredEntry>>> {
        Ok(self.entries.write().map_err(|_| StoreError::LockPoisoned)?)
    }

    fn record_hit(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self, expired: bool) {
        if let Ok(mut stats) = self.stats.write() {
            stats.misses += 1;
            if expired {
                stats.expirations += 1;
            }
        }
    }
}

impl CacheStore for InMemoryStore {
    fn get(&self, key: &str) -> FieldCacheResult<Option<String>> {
        let now = Utc::now();
        let lookup = |entries: &HashMap<String, StoredEntry>| {
            entries
                .get(key)
                .map(|entry| (!entry.is_expired(now)).then(|| entry.raw.clone()))
        };

        match lookup(&*self.read_entries()?) {
            Some(Some(raw)) => {
                self.record_hit();
                return Ok(Some(raw));
            }
            None => {
                self.record_miss(false);
                return Ok(None);
            }
            Some(None) => {}
        }

        // Expired under the read lock; re-check under the write lock since a
        // writer may have replaced the entry in between.
        let mut entries = self.write_entries()?;
        match lookup(&*entries) {
            Some(Some(raw)) => {
                drop(entries);
                self.record_hit();
                Ok(Some(raw))
            }
            Some(None) => {
                entries.remove(key);
                drop(entries);
                self.record_miss(true);
                Ok(None)
            }
            None => {
                drop(entries);
                self.record_miss(false);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, raw: &str, ttl: Option<Duration>) -> FieldCacheResult<()> {
        let now = Utc::now();
        let expires_at = ttl
            .or(self.default_ttl)
            .and_then(|ttl| deadline_after(now, ttl));

        self.write_entries()?.insert(
            key.to_string(),
            StoredEntry {
                raw: raw.to_string(),
                expires_at,
            },
        );

        if let Ok(mut stats) = self.stats.write() {
            stats.writes += 1;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> FieldCacheResult<bool> {
        let now = Utc::now();
        let removed = self.write_entries()?.remove(key);
        Ok(removed.is_some_and(|entry| !entry.is_expired(now)))
    }

    fn stats(&self) -> FieldCacheResult<CacheStats> {
        let entry_count = self.read_entries()?.len() as u64;
        let mut stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .map_err(|_| StoreError::LockPoisoned)?;
        stats.entry_count = entry_count;
        Ok(stats)
    }
}
