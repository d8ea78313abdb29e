//! FieldCache Core - Shared Types
//!
//! Error taxonomy, the value codec, and configuration. Every other crate in
//! the workspace depends on this one; it knows nothing about stores.

pub mod config;
pub mod error;
pub mod value;

pub use config::{
    CoercionPolicy, FieldCacheConfig, LmdbConfig, StoreConfig, CONFIG_ENV_VAR, MAX_LMDB_SIZE_MB,
};
pub use error::{
    CoercionError, ComputeError, ConfigError, FieldCacheError, FieldCacheResult, SchemaError,
    StoreError,
};
pub use value::{FieldValue, ValueKind};
