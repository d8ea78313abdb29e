//! Declarative field caching.
//!
//! An entity type declares its cache fields once as `static`
//! [`FieldAccessor`]s and lists them in a [`FieldRegistry`]. Each instance
//! embeds a [`CacheContext`] carrying the store handle and the key suffix
//! that tells its fields apart from those of other instances.
//!
//! Reading a field builds its key, asks the store, and on a miss runs the
//! field's compute function, stores the encoded result and returns it.
//! Refreshing skips the store read.
//!
//! # Keys
//!
//! Keys are plain dotted text so that they can be inspected in the store:
//!
//! ```text
//! cache.orgs.caches.OrgResourceCache.user_amount.42
//! ```
//!
//! See [`KeyBuilder`] for the layout.
//!
//! # Example
//!
//! ```ignore
//! static USER_AMOUNT: FieldAccessor<OrgResourceCache, i64> =
//!     FieldAccessor::new("user_amount").computed_by(OrgResourceCache::compute_user_amount);
//!
//! let mut org = OrgResourceCache::new(OrgId(42), directory, store);
//! let users = org.get(&USER_AMOUNT)?;     // computes and stores
//! let users = org.get(&USER_AMOUNT)?;     // served from the store
//! org.refresh(&["user_amount"])?;         // recomputes
//! ```

pub mod accessor;
pub mod entity;
pub mod key;
pub mod lmdb;
pub mod memory;
pub mod registry;
pub mod schema;
pub mod store;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use fieldcache_core::{FieldCacheResult, StoreConfig};

pub use accessor::{ComputeFn, FieldAccessor, FieldRead, ReadOutcome};
pub use entity::{CacheContext, CacheEntity};
pub use key::{CacheKey, EntityTypeId, KeyBuilder, KeySuffix, DEFAULT_KEY_PREFIX, KEY_DELIMITER};
pub use lmdb::{LmdbStore, LmdbStoreError};
pub use memory::InMemoryStore;
pub use registry::{FieldRegistry, FieldRegistryBuilder, RegisteredField};
pub use schema::FieldSchema;
pub use store::{CacheStats, CacheStore};

/// Open the store described by `config`: LMDB when configured, memory otherwise.
pub fn open_store(config: &StoreConfig) -> FieldCacheResult<Arc<dyn CacheStore>> {
    let default_ttl = config.default_ttl();
    match &config.lmdb {
        Some(lmdb) => {
            tracing::info!(
                path = %lmdb.path.display(),
                max_size_mb = lmdb.max_size_mb,
                "opening lmdb cache store"
            );
            let store = LmdbStore::new(&lmdb.path, lmdb.max_size_mb)?.with_default_ttl(default_ttl);
            Ok(Arc::new(store))
        }
        None => {
            let store = match default_ttl {
                Some(ttl) => InMemoryStore::with_default_ttl(ttl),
                None => InMemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}
