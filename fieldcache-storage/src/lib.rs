//! FieldCache Storage - Cache Stores and the Field Accessor Protocol
//!
//! Store backends (in-memory and LMDB) and the declarative field cache
//! built on top of them: schemas, accessors, registries and entities.

pub mod cache;

pub use cache::{
    open_store, CacheContext, CacheEntity, CacheKey, CacheStats, CacheStore, ComputeFn,
    EntityTypeId, FieldAccessor, FieldRead, FieldRegistry, FieldRegistryBuilder, FieldSchema,
    InMemoryStore, KeyBuilder, KeySuffix, LmdbStore, LmdbStoreError, ReadOutcome,
    RegisteredField, DEFAULT_KEY_PREFIX, KEY_DELIMITER,
};
