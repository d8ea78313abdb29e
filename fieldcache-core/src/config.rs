//! Configuration loading for field caches.
//!
//! A config file must spell out every non-optional field. `Default` exists for
//! embedding callers and tests that never touch a file.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted by [`FieldCacheConfig::load`].
pub const CONFIG_ENV_VAR: &str = "FIELDCACHE_CONFIG";

/// Largest LMDB map size, in megabytes, whose byte count fits in `usize`.
pub const MAX_LMDB_SIZE_MB: usize = usize::MAX / (1024 * 1024);

/// What a cache hit does when the stored text does not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionPolicy {
    /// Fail the read with a `CoercionError`.
    #[default]
    FailClosed,
    /// Treat the entry as a miss: recompute and overwrite it.
    Recompute,
}

/// Master configuration for the field cache layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldCacheConfig {
    /// First segment of every cache key.
    pub key_prefix: String,
    pub coercion: CoercionPolicy,
    pub store: StoreConfig,
}

/// Store backend selection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Expiry applied when a field declares no TTL. Absent means no expiry.
    pub default_ttl_secs: Option<u64>,
    /// Use LMDB instead of the in-memory store.
    pub lmdb: Option<LmdbConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LmdbConfig {
    pub path: PathBuf,
    pub max_size_mb: usize,
}

impl Default for FieldCacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "cache".to_string(),
            coercion: CoercionPolicy::FailClosed,
            store: StoreConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }
}

impl FieldCacheConfig {
    /// Load from the path given by `--config` or `FIELDCACHE_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args(std::env::args().skip(1)).or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: FieldCacheConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = self.key_prefix.trim();
        if prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "key_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if prefix.len() != self.key_prefix.len()
            || self.key_prefix.chars().any(char::is_whitespace)
        {
            return Err(ConfigError::InvalidValue {
                field: "key_prefix",
                reason: "must not contain whitespace".to_string(),
            });
        }
        if self.key_prefix.starts_with('.') || self.key_prefix.ends_with('.') {
            return Err(ConfigError::InvalidValue {
                field: "key_prefix",
                reason: "must not start or end with '.'".to_string(),
            });
        }
        if self.store.default_ttl_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "store.default_ttl_secs",
                reason: "must be > 0 when set".to_string(),
            });
        }
        if let Some(lmdb) = &self.store.lmdb {
            if lmdb.path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "store.lmdb.path",
                    reason: "must not be empty".to_string(),
                });
            }
            if lmdb.max_size_mb == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "store.lmdb.max_size_mb",
                    reason: "must be > 0".to_string(),
                });
            }
            if lmdb.max_size_mb > MAX_LMDB_SIZE_MB {
                return Err(ConfigError::InvalidValue {
                    field: "store.lmdb.max_size_mb",
                    reason: format!("must be <= {}", MAX_LMDB_SIZE_MB),
                });
            }
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args(args: impl IntoIterator<Item = String>) -> Option<PathBuf> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
