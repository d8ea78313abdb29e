//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep field values in a
//! memory-mapped file that survives process restarts.
//!
//! # Record Format
//!
//! Keys are the UTF-8 cache key. Values are:
//! - Bytes 0-7: expiry deadline as Unix millis, little endian (0 = never)
//! - Bytes 8..: the raw field value as UTF-8
//!
//! Expired records are deleted the first time they are read. The delete
//! re-checks the record inside its write transaction, so a value written
//! after the read is never removed.

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fieldcache_core::{FieldCacheError, FieldCacheResult, StoreError};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::memory::deadline_after;
use super::store::{CacheStats, CacheStore};

const HEADER_LEN: usize = 8;
const NEVER_EXPIRES: i64 = 0;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for FieldCacheError {
    fn from(e: LmdbStoreError) -> Self {
        FieldCacheError::Store(StoreError::Backend {
            reason: e.to_string(),
        })
    }
}

fn txn_error(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

/// A decoded record.
struct Record {
    raw: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Record {
    fn encode(raw: &str, expires_at: Option<DateTime<Utc>>) -> Vec<u8> {
        let millis = expires_at
            .map(|deadline| deadline.timestamp_millis())
            .unwrap_or(NEVER_EXPIRES);
        let mut bytes = Vec::with_capacity(HEADER_LEN + raw.len());
        bytes.extend_from_slice(&millis.to_le_bytes());
        bytes.extend_from_slice(raw.as_bytes());
        bytes
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() < HEADER_LEN {
            return Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("record is {} bytes, header needs {}", bytes.len(), HEADER_LEN),
            });
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[..HEADER_LEN]);
        let millis = i64::from_le_bytes(header);
        let expires_at = if millis == NEVER_EXPIRES {
            None
        } else {
            Some(DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("expiry {} out of range", millis),
            })?)
        };
        let raw = std::str::from_utf8(&bytes[HEADER_LEN..])
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?
            .to_string();
        Ok(Self { raw, expires_at })
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// LMDB-backed cache store.
///
/// # Example
///
/// ```ignore
/// use fieldcache_storage::cache::{CacheStore, LmdbStore};
///
/// let store = LmdbStore::new("/var/lib/fieldcache", 64)?;
/// store.set("cache.orgs.caches.OrgResourceCache.user_amount.42", "10", None)?;
/// ```
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    stats: RwLock<CacheStats>,
    default_ttl: Option<Duration>,
}

impl LmdbStore {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let map_size = max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                LmdbStoreError::EnvOpen(format!("map size of {} MB overflows usize", max_size_mb))
            })?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_error)?;

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats::default()),
            default_ttl: None,
        })
    }

    /// Apply `ttl` to writes that carry none.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn read_record(&self, key: &str) -> FieldCacheResult<Option<Record>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let bytes = self.db.get(&rtxn, key.as_bytes()).map_err(txn_error)?;
        match bytes {
            Some(bytes) => Ok(Some(Record::decode(key, bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete `key` if its record is still expired at `now`.
    ///
    /// Returns the record found under the write lock when it is live.
    fn remove_expired(&self, key: &str, now: DateTime<Utc>) -> FieldCacheResult<Option<Record>> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let current = match self.db.get(&wtxn, key.as_bytes()).map_err(txn_error)? {
            Some(bytes) => Some(Record::decode(key, bytes)?),
            None => None,
        };
        match current {
            Some(record) if !record.is_expired(now) => Ok(Some(record)),
            Some(_) => {
                self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_error)?;
                wtxn.commit().map_err(txn_error)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn update_stats(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }
}

impl CacheStore for LmdbStore {
    fn get(&self, key: &str) -> FieldCacheResult<Option<String>> {
        let now = Utc::now();
        match self.read_record(key)? {
            Some(record) if !record.is_expired(now) => {
                self.update_stats(|s| s.hits += 1);
                Ok(Some(record.raw))
            }
            Some(_) => match self.remove_expired(key, now)? {
                Some(rewritten) => {
                    self.update_stats(|s| s.hits += 1);
                    Ok(Some(rewritten.raw))
                }
                None => {
                    self.update_stats(|s| {
                        s.misses += 1;
                        s.expirations += 1;
                    });
                    Ok(None)
                }
            },
            None => {
                self.update_stats(|s| s.misses += 1);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, raw: &str, ttl: Option<Duration>) -> FieldCacheResult<()> {
        let expires_at = ttl
            .or(self.default_ttl)
            .and_then(|ttl| deadline_after(Utc::now(), ttl));
        let bytes = Record::encode(raw, expires_at);

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        self.update_stats(|s| s.writes += 1);
        Ok(())
    }

    fn delete(&self, key: &str) -> FieldCacheResult<bool> {
        let now = Utc::now();
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let live = match self.db.get(&wtxn, key.as_bytes()).map_err(txn_error)? {
            Some(bytes) => !Record::decode(key, bytes)?.is_expired(now),
            None => false,
        };
        let deleted = self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(deleted && live)
    }

    fn stats(&self) -> FieldCacheResult<CacheStats> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let entry_count = self.db.len(&rtxn).map_err(txn_error)?;
        let mut stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .map_err(|_| StoreError::LockPoisoned)?;
        stats.entry_count = entry_count;
        Ok(stats)
    }
}
