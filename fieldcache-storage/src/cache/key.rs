//! Cache key derivation.
//!
//! Keys are human-readable dotted paths:
//!
//! ```text
//! <prefix>.<namespace>.<TypeName>.<field>.<suffix>
//! cache.orgs.caches.OrgResourceCache.user_amount.42
//! ```
//!
//! The entity segment comes from the entity *type*, so every instance of a
//! type with the same suffix resolves to the same key and shares its cached
//! values.

use std::borrow::Cow;
use std::fmt;

/// Separator between key segments and between key suffix parts.
pub const KEY_DELIMITER: char = '.';

/// Prefix used when no configuration overrides it.
pub const DEFAULT_KEY_PREFIX: &str = "cache";

/// Identity of an entity type: the namespace it was defined in plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTypeId {
    namespace: Cow<'static, str>,
    name: &'static str,
}

impl EntityTypeId {
    /// Create a type id from an already dotted namespace.
    pub const fn new(namespace: &'static str, name: &'static str) -> Self {
        Self {
            namespace: Cow::Borrowed(namespace),
            name,
        }
    }

    /// Create a type id from a Rust `module_path!()`, turning `a::b` into `a.b`.
    pub fn from_module_path(module_path: &'static str, name: &'static str) -> Self {
        let namespace = if module_path.contains("::") {
            Cow::Owned(module_path.replace("::", "."))
        } else {
            Cow::Borrowed(module_path)
        };
        Self { namespace, name }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(self.name)
        } else {
            write!(f, "{}{}{}", self.namespace, KEY_DELIMITER, self.name)
        }
    }
}

/// Per-instance identity components, rendered and joined with `.`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeySuffix(String);

impl KeySuffix {
    /// Render every part with `Display` and join them with `.`.
    ///
    /// Parts of different types can be mixed through `&dyn Display`:
    /// `KeySuffix::from_parts([&org_id as &dyn Display, &"members"])`.
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: fmt::Display,
    {
        let mut joined = String::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                joined.push(KEY_DELIMITER);
            }
            joined.push_str(&part.to_string());
        }
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for KeySuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully derived cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds cache keys under a fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    prefix: String,
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derive the key for one field of one entity type under `suffix`.
    ///
    /// An empty namespace drops its segment. An empty suffix still leaves
    /// its (empty) trailing segment in place.
    pub fn build(&self, entity: &EntityTypeId, field: &str, suffix: &KeySuffix) -> CacheKey {
        let mut key = String::with_capacity(
            self.prefix.len()
                + entity.namespace().len()
                + entity.name().len()
                + field.len()
                + suffix.as_str().len()
                + 4,
        );
        key.push_str(&self.prefix);
        key.push(KEY_DELIMITER);
        if !entity.namespace().is_empty() {
            key.push_str(entity.namespace());
            key.push(KEY_DELIMITER);
        }
        key.push_str(entity.name());
        key.push(KEY_DELIMITER);
        key.push_str(field);
        key.push(KEY_DELIMITER);
        key.push_str(suffix.as_str());
        CacheKey(key)
    }
}
