//! Entities that own cache fields.

use std::fmt;
use std::sync::Arc;

use fieldcache_core::{CoercionPolicy, FieldCacheConfig, FieldCacheResult, FieldValue};

use super::accessor::{FieldAccessor, FieldRead};
use super::key::{EntityTypeId, KeyBuilder, KeySuffix};
use super::registry::FieldRegistry;
use super::store::CacheStore;

/// Per-instance cache state embedded in every entity.
#[derive(Clone)]
pub struct CacheContext {
    store: Arc<dyn CacheStore>,
    key_builder: KeyBuilder,
    coercion: CoercionPolicy,
    suffix: KeySuffix,
}

impl CacheContext {
    /// Context with the default key prefix and fail-closed coercion.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            key_builder: KeyBuilder::default(),
            coercion: CoercionPolicy::default(),
            suffix: KeySuffix::default(),
        }
    }

    /// Context taking its key prefix and coercion policy from `config`.
    pub fn with_config(store: Arc<dyn CacheStore>, config: &FieldCacheConfig) -> Self {
        Self {
            store,
            key_builder: KeyBuilder::new(config.key_prefix.clone()),
            coercion: config.coercion,
            suffix: KeySuffix::default(),
        }
    }

    pub fn with_key_builder(mut self, key_builder: KeyBuilder) -> Self {
        self.key_builder = key_builder;
        self
    }

    pub fn with_coercion_policy(mut self, policy: CoercionPolicy) -> Self {
        self.coercion = policy;
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn key_builder(&self) -> &KeyBuilder {
        &self.key_builder
    }

    pub fn coercion_policy(&self) -> CoercionPolicy {
        self.coercion
    }

    pub fn set_coercion_policy(&mut self, policy: CoercionPolicy) {
        self.coercion = policy;
    }

    pub fn key_suffix(&self) -> &KeySuffix {
        &self.suffix
    }

    pub fn set_key_suffix(&mut self, suffix: KeySuffix) {
        self.suffix = suffix;
    }
}

impl fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheContext")
            .field("key_prefix", &self.key_builder.prefix())
            .field("coercion", &self.coercion)
            .field("suffix", &self.suffix)
            .finish_non_exhaustive()
    }
}

/// A type whose instances own cache fields.
///
/// Implementors supply their type identity, their field registry and access
/// to an embedded [`CacheContext`]. Everything else is provided.
///
/// # Implementation Requirements
///
/// - `entity_type()` must return the same value on every call
/// - `fields()` must return the same registry on every call, usually a
///   `Lazy` static
/// - the key suffix should be set before the first field access
pub trait CacheEntity: Sized + 'static {
    fn entity_type() -> EntityTypeId;

    fn fields() -> &'static FieldRegistry<Self>;

    fn cache(&self) -> &CacheContext;

    fn cache_mut(&mut self) -> &mut CacheContext;

    fn key_suffix(&self) -> &KeySuffix {
        self.cache().key_suffix()
    }

    /// Render `parts` with `Display`, join them with `.` and use the result
    /// as the key suffix of every field of this instance.
    fn set_key_suffix<I, P>(&mut self, parts: I)
    where
        I: IntoIterator<Item = P>,
        P: fmt::Display,
    {
        self.cache_mut().set_key_suffix(KeySuffix::from_parts(parts));
    }

    fn get<T: FieldValue>(&self, field: &FieldAccessor<Self, T>) -> FieldCacheResult<T> {
        field.get(self)
    }

    fn read<T: FieldValue>(&self, field: &FieldAccessor<Self, T>) -> FieldCacheResult<FieldRead<T>> {
        field.read(self)
    }

    /// Recompute the named fields, or all of them when `field_names` is empty.
    ///
    /// See [`FieldRegistry::refresh`] for ordering and failure behavior.
    fn refresh(&self, field_names: &[&str]) -> FieldCacheResult<()> {
        Self::fields().refresh(self, field_names)
    }

    fn refresh_all(&self) -> FieldCacheResult<()> {
        self.refresh(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryStore;
    use crate::cache::testing::{Counter, HITS, LABEL};
    use fieldcache_core::{FieldCacheError, SchemaError};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Store that remembers the order of writes.
    #[derive(Default)]
    struct OrderedStore {
        inner: InMemoryStore,
        writes: Mutex<Vec<String>>,
    }

    impl OrderedStore {
        fn written(&self) -> Vec<String> {
            self.writes.lock().expect("lock should not be poisoned").clone()
        }
    }

    impl CacheStore for OrderedStore {
        fn get(&self, key: &str) -> FieldCacheResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, raw: &str, ttl: Option<Duration>) -> FieldCacheResult<()> {
            self.writes
                .lock()
                .expect("lock should not be poisoned")
                .push(key.to_string());
            self.inner.set(key, raw, ttl)
        }

        fn delete(&self, key: &str) -> FieldCacheResult<bool> {
            self.inner.delete(key)
        }

        fn stats(&self) -> FieldCacheResult<crate::cache::store::CacheStats> {
            self.inner.stats()
        }
    }

    #[test]
    fn test_selective_refresh_touches_only_named_field() {
        let store = Arc::new(OrderedStore::default());
        let counter = Counter::new(store.clone(), "s", 2);

        counter.refresh(&["label"]).expect("refresh should succeed");

        assert_eq!(store.written(), vec!["cache.tests.Counter.label.s".to_string()]);
        assert_eq!(counter.label_calls(), 1);
        assert_eq!(counter.hits_calls(), 0);
    }

    #[test]
    fn test_refresh_follows_given_order() {
        let store = Arc::new(OrderedStore::default());
        let counter = Counter::new(store.clone(), "s", 2);

        counter.refresh(&["label", "hits"]).expect("refresh should succeed");

        assert_eq!(
            store.written(),
            vec![
                "cache.tests.Counter.label.s".to_string(),
                "cache.tests.Counter.hits.s".to_string(),
            ]
        );
    }

    #[test]
    fn test_refresh_all_uses_declaration_order() {
        let store = Arc::new(OrderedStore::default());
        let counter = Counter::new(store.clone(), "s", 2);
        counter.get(&HITS).expect("get should succeed");

        counter.refresh_all().expect("refresh should succeed");

        assert_eq!(
            store.written(),
            vec![
                "cache.tests.Counter.hits.s".to_string(),
                "cache.tests.Counter.hits.s".to_string(),
                "cache.tests.Counter.label.s".to_string(),
                "cache.tests.Counter.short_lived.s".to_string(),
            ]
        );
        assert_eq!(counter.hits_calls(), 3);
    }

    #[test]
    fn test_refresh_unknown_name_computes_nothing() {
        let store = Arc::new(OrderedStore::default());
        let counter = Counter::new(store.clone(), "s", 2);

        let err = counter
            .refresh(&["label", "bogus"])
            .expect_err("unknown field must fail");

        assert!(matches!(
            err,
            FieldCacheError::Schema(SchemaError::UnknownField { ref field, .. }) if field == "bogus"
        ));
        assert!(store.written().is_empty());
        assert_eq!(counter.label_calls(), 0);
    }

    #[test]
    fn test_refresh_stops_at_first_failure() {
        let store = Arc::new(OrderedStore::default());
        let mut counter = Counter::new(store.clone(), "s", 2);
        counter.fail_hits = true;

        let err = counter
            .refresh(&["label", "hits"])
            .expect_err("hits compute fails");
        assert!(matches!(err, FieldCacheError::Compute(_)));
        assert_eq!(store.written(), vec!["cache.tests.Counter.label.s".to_string()]);

        let err = counter.refresh_all().expect_err("hits is refreshed first");
        assert!(matches!(err, FieldCacheError::Compute(_)));
        assert_eq!(store.written().len(), 1, "label is not reached");
    }

    #[test]
    fn test_equal_suffixes_share_state() {
        let store = Arc::new(InMemoryStore::new());
        let first = Counter::new(store.clone(), "same", 5);
        let second = Counter::new(store.clone(), "same", 50);

        assert_eq!(first.get(&HITS).expect("get should succeed"), 5);
        assert_eq!(second.get(&HITS).expect("get should succeed"), 5);
        assert_eq!(second.hits_calls(), 0);
    }

    #[test]
    fn test_distinct_suffixes_are_isolated() {
        let store = Arc::new(InMemoryStore::new());
        let first = Counter::new(store.clone(), "one", 5);
        let second = Counter::new(store.clone(), "two", 50);

        assert_eq!(first.get(&HITS).expect("get should succeed"), 5);
        assert_eq!(second.get(&HITS).expect("get should succeed"), 50);
        assert_ne!(HITS.cache_key(&first), HITS.cache_key(&second));
    }

    #[test]
    fn test_set_key_suffix_repoints_fields() {
        let store = Arc::new(InMemoryStore::new());
        let mut counter = Counter::new(store.clone(), "old", 1);
        counter.get(&LABEL).expect("get should succeed");

        counter.set_key_suffix(["new", "7"]);

        assert_eq!(counter.key_suffix().as_str(), "new.7");
        assert_eq!(
            HITS.cache_key(&counter).as_str(),
            "cache.tests.Counter.hits.new.7"
        );
        let read = counter.read(&LABEL).expect("read should succeed");
        assert!(read.was_cache_miss());
        assert_eq!(counter.label_calls(), 2);
    }

    #[test]
    fn test_context_builders_override_defaults() {
        let store = Arc::new(InMemoryStore::new());
        store
            .set("tenant.tests.Counter.hits.b", "garbage", None)
            .expect("set should succeed");
        let context = CacheContext::new(store.clone())
            .with_key_builder(KeyBuilder::new("tenant"))
            .with_coercion_policy(CoercionPolicy::Recompute);
        assert_eq!(context.coercion_policy(), CoercionPolicy::Recompute);

        let mut counter = Counter::new(store.clone(), "b", 8);
        *counter.cache_mut() = context;
        counter.set_key_suffix(["b"]);

        let read = counter.read(&HITS).expect("read should recover");
        assert_eq!(read.key().as_str(), "tenant.tests.Counter.hits.b");
        assert_eq!(read.outcome(), crate::cache::accessor::ReadOutcome::Recovered);
        assert_eq!(read.into_value(), 8);
    }

    #[test]
    fn test_context_from_config() {
        let config = FieldCacheConfig::from_toml_str(
            r#"
key_prefix = "app"
coercion = "recompute"

[store]
"#,
        )
        .expect("config should parse");
        let context = CacheContext::with_config(Arc::new(InMemoryStore::new()), &config);

        assert_eq!(context.key_builder().prefix(), "app");
        assert_eq!(context.coercion_policy(), CoercionPolicy::Recompute);
        assert!(context.key_suffix().is_empty());
        assert!(format!("{:?}", context).contains("app"));
    }
}
