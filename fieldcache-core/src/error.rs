//! Error types for field cache operations

use crate::ValueKind;
use thiserror::Error;

/// Errors in how an entity type declared its cache fields.
///
/// These are programmer errors: they surface on first access (or from
/// `FieldRegistry::validate`) and are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("No compute binding `{binding}` for field {field} on {entity}")]
    MissingComputeBinding {
        entity: String,
        field: String,
        binding: String,
    },

    #[error("Unknown cache field {field} on {entity}")]
    UnknownField { entity: String, field: String },

    #[error("Duplicate cache field {field} on {entity}")]
    DuplicateField { entity: String, field: String },
}

/// A stored raw value could not be decoded into the field's declared kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoercionError {
    #[error("Cannot coerce stored value {raw:?} at {key} to {kind}: {reason}")]
    Invalid {
        key: String,
        kind: ValueKind,
        raw: String,
        reason: String,
    },
}

/// Errors raised by a cache store backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store backend failure: {reason}")]
    Backend { reason: String },

    #[error("Corrupt entry at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Failures reported by a compute binding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComputeError {
    #[error("Compute binding `{binding}` failed: {reason}")]
    Failed { binding: String, reason: String },
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or FIELDCACHE_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all field cache errors.
#[derive(Debug, Clone, Error)]
pub enum FieldCacheError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Coercion error: {0}")]
    Coercion(#[from] CoercionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),
}

/// Result type alias for field cache operations.
pub type FieldCacheResult<T> = Result<T, FieldCacheError>;

// =============================================================================
// TESTS
// =============================================================================
