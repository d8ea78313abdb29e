//! FieldCache Test Utilities
//!
//! Centralized test infrastructure for the FieldCache workspace:
//! - Recording store with call counters and failure injection
//! - Log capture layer for asserting on tracing output
//! - Proptest generators for keys, TTLs and configuration
//! - Test fixtures for common scenarios
//! - Custom assertions for FieldCache-specific errors

// Re-export store types from their source crate
pub use fieldcache_storage::{CacheStats, CacheStore, InMemoryStore, LmdbStore};

// Re-export core types for convenience
pub use fieldcache_core::{
    CoercionError, CoercionPolicy, FieldCacheConfig, FieldCacheError, FieldCacheResult,
    LmdbConfig, SchemaError, StoreConfig, StoreError, ValueKind,
};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

// ============================================================================
// RECORDING STORE
// ============================================================================

/// One `set` call seen by a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub key: String,
    pub raw: String,
    pub ttl: Option<Duration>,
}

/// In-memory store that records every call and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    gets: AtomicUsize,
    writes: Mutex<Vec<RecordedWrite>>,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing in-memory store, e.g. one with a default TTL.
    pub fn wrapping(inner: InMemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.writes.lock().map(|writes| writes.len()).unwrap_or_default()
    }

    /// Every write, oldest first.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().map(|writes| writes.clone()).unwrap_or_default()
    }

    pub fn writes_for(&self, key: &str) -> Vec<RecordedWrite> {
        self.writes()
            .into_iter()
            .filter(|write| write.key == key)
            .collect()
    }

    /// Make subsequent `get` calls fail with a backend error.
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `set` calls fail with a backend error.
    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    /// Forget recorded calls, keeping the stored entries.
    pub fn reset_counters(&self) {
        self.gets.store(0, Ordering::SeqCst);
        if let Ok(mut writes) = self.writes.lock() {
            writes.clear();
        }
    }
}

fn injected_failure(operation: &str) -> FieldCacheError {
    StoreError::Backend {
        reason: format!("injected {} failure", operation),
    }
    .into()
}

impl CacheStore for RecordingStore {
    fn get(&self, key: &str) -> FieldCacheResult<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(injected_failure("get"));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, raw: &str, ttl: Option<Duration>) -> FieldCacheResult<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(injected_failure("set"));
        }
        self.inner.set(key, raw, ttl)?;
        self.writes
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .push(RecordedWrite {
                key: key.to_string(),
                raw: raw.to_string(),
                ttl,
            });
        Ok(())
    }

    fn delete(&self, key: &str) -> FieldCacheResult<bool> {
        self.inner.delete(key)
    }

    fn stats(&self) -> FieldCacheResult<CacheStats> {
        self.inner.stats()
    }
}

// ============================================================================
// LOG CAPTURE
// ============================================================================

/// One tracing event seen by a [`LogCapture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Tracing layer that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Events whose message equals `message`.
    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.message == message)
            .collect()
    }

    pub fn with_target(&self, target: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.target == target)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let captured = CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        };
        if let Ok(mut events) = self.events.lock() {
            events.push(captured);
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.insert(field.name().to_string(), rendered);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }
}

/// Run `f` with a [`LogCapture`] installed as the thread's subscriber.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, LogCapture) {
    let capture = LogCapture::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture)
}

/// Install a global fmt subscriber for tests. Safe to call more than once.
///
/// Honors `RUST_LOG`; defaults to debug output for the cache crates.
pub fn init_test_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fieldcache=debug,fieldcache_storage=debug,warn"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for FieldCache types.

    use super::*;
    use proptest::prelude::*;

    /// A key segment: lowercase identifier without the key delimiter.
    pub fn arb_key_part() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}"
    }

    /// Between one and three suffix components.
    pub fn arb_suffix_parts() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_key_part(), 1..4)
    }

    pub fn arb_key_prefix() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,7}"
    }

    pub fn arb_ttl() -> impl Strategy<Value = Option<Duration>> {
        prop_oneof![
            Just(None),
            (1u64..86_400).prop_map(|secs| Some(Duration::from_secs(secs))),
        ]
    }

    pub fn arb_coercion_policy() -> impl Strategy<Value = CoercionPolicy> {
        prop_oneof![Just(CoercionPolicy::FailClosed), Just(CoercionPolicy::Recompute)]
    }

    pub fn arb_value_kind() -> impl Strategy<Value = ValueKind> {
        prop_oneof![
            Just(ValueKind::Text),
            Just(ValueKind::Integer),
            Just(ValueKind::Float),
            Just(ValueKind::Boolean),
        ]
    }

    /// Configurations that pass validation. Always in-memory.
    pub fn arb_valid_config() -> impl Strategy<Value = FieldCacheConfig> {
        (
            arb_key_prefix(),
            arb_coercion_policy(),
            prop::option::of(1u64..86_400),
        )
            .prop_map(|(key_prefix, coercion, default_ttl_secs)| FieldCacheConfig {
                key_prefix,
                coercion,
                store: StoreConfig {
                    default_ttl_secs,
                    lmdb: None,
                },
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use std::path::Path;

    /// TOML for a configuration exercising every section.
    pub const SAMPLE_CONFIG_TOML: &str = r#"
key_prefix = "cache"
coercion = "recompute"

[store]
default_ttl_secs = 300
"#;

    pub fn minimal_config() -> FieldCacheConfig {
        FieldCacheConfig::default()
    }

    pub fn config_with(key_prefix: &str, coercion: CoercionPolicy) -> FieldCacheConfig {
        FieldCacheConfig {
            key_prefix: key_prefix.to_string(),
            coercion,
            ..FieldCacheConfig::default()
        }
    }

    pub fn memory_store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new())
    }

    pub fn recording_store() -> Arc<RecordingStore> {
        Arc::new(RecordingStore::new())
    }

    /// Open an LMDB store under `dir` (usually a `tempfile::TempDir`).
    pub fn lmdb_store(dir: &Path) -> FieldCacheResult<Arc<LmdbStore>> {
        Ok(Arc::new(LmdbStore::new(dir.join("fieldcache"), 16)?))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! FieldCache-specific assertion helpers.

    use super::*;

    pub fn assert_config_valid(config: &FieldCacheConfig) {
        if let Err(e) = config.validate() {
            panic!("config should be valid: {}", e);
        }
    }

    /// Assert the result failed with a missing compute binding for `field`.
    pub fn assert_missing_binding<T: std::fmt::Debug>(result: &FieldCacheResult<T>, field: &str) {
        match result {
            Err(FieldCacheError::Schema(SchemaError::MissingComputeBinding {
                field: actual, ..
            })) => assert_eq!(actual, field, "missing binding reported for wrong field"),
            other => panic!("expected MissingComputeBinding for {}, got {:?}", field, other),
        }
    }

    pub fn assert_unknown_field<T: std::fmt::Debug>(result: &FieldCacheResult<T>, field: &str) {
        match result {
            Err(FieldCacheError::Schema(SchemaError::UnknownField { field: actual, .. })) => {
                assert_eq!(actual, field, "unknown field reported for wrong name")
            }
            other => panic!("expected UnknownField for {}, got {:?}", field, other),
        }
    }

    /// Assert the result failed to decode a stored value of `kind`.
    pub fn assert_coercion_error<T: std::fmt::Debug>(result: &FieldCacheResult<T>, kind: ValueKind) {
        match result {
            Err(FieldCacheError::Coercion(CoercionError::Invalid { kind: actual, .. })) => {
                assert_eq!(*actual, kind, "coercion error for wrong kind")
            }
            other => panic!("expected CoercionError for {}, got {:?}", kind, other),
        }
    }

    pub fn assert_store_error<T: std::fmt::Debug>(result: &FieldCacheResult<T>) {
        assert!(
            matches!(result, Err(FieldCacheError::Store(_))),
            "expected store error, got {:?}",
            result
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
