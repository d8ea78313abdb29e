//! Entities shared by the unit tests of the cache module.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use fieldcache_core::{ComputeError, FieldCacheResult, StoreError};
use once_cell::sync::Lazy;

use super::accessor::FieldAccessor;
use super::entity::{CacheContext, CacheEntity};
use super::key::EntityTypeId;
use super::registry::FieldRegistry;
use super::store::{CacheStats, CacheStore};

pub(crate) static HITS: FieldAccessor<Counter, i64> =
    FieldAccessor::new("hits").computed_by(Counter::compute_hits);

pub(crate) static LABEL: FieldAccessor<Counter, String> = FieldAccessor::new("label")
    .with_ttl(Duration::from_secs(60))
    .computed_by(Counter::compute_label);

pub(crate) static SHORT_LIVED: FieldAccessor<Counter, i64> = FieldAccessor::new("short_lived")
    .with_ttl(Duration::from_millis(20))
    .computed_by(Counter::compute_hits);

/// Bound but left out of `COUNTER_FIELDS`.
pub(crate) static UNLISTED: FieldAccessor<Counter, i64> =
    FieldAccessor::new("unlisted").computed_by(Counter::compute_hits);

static COUNTER_FIELDS: Lazy<FieldRegistry<Counter>> = Lazy::new(|| {
    FieldRegistry::builder()
        .field(&HITS)
        .field(&LABEL)
        .field(&SHORT_LIVED)
        .build()
});

/// Entity whose compute bindings count their invocations.
pub(crate) struct Counter {
    cache: CacheContext,
    pub base: i64,
    pub hits_calls: Arc<AtomicUsize>,
    pub label_calls: Arc<AtomicUsize>,
    pub fail_hits: bool,
    pub barrier: Option<Arc<Barrier>>,
}

impl Counter {
    pub fn new(store: Arc<dyn CacheStore>, suffix: &str, base: i64) -> Self {
        let mut counter = Self {
            cache: CacheContext::new(store),
            base,
            hits_calls: Arc::new(AtomicUsize::new(0)),
            label_calls: Arc::new(AtomicUsize::new(0)),
            fail_hits: false,
            barrier: None,
        };
        counter.set_key_suffix([suffix]);
        counter
    }

    pub fn hits_calls(&self) -> usize {
        self.hits_calls.load(Ordering::SeqCst)
    }

    pub fn label_calls(&self) -> usize {
        self.label_calls.load(Ordering::SeqCst)
    }

    fn compute_hits(&self) -> FieldCacheResult<i64> {
        self.hits_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        if self.fail_hits {
            return Err(ComputeError::Failed {
                binding: "compute_hits".to_string(),
                reason: "source unavailable".to_string(),
            }
            .into());
        }
        Ok(self.base)
    }

    fn compute_label(&self) -> FieldCacheResult<String> {
        self.label_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("counter-{}", self.base))
    }
}

impl CacheEntity for Counter {
    fn entity_type() -> EntityTypeId {
        EntityTypeId::new("tests", "Counter")
    }

    fn fields() -> &'static FieldRegistry<Self> {
        &COUNTER_FIELDS
    }

    fn cache(&self) -> &CacheContext {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut CacheContext {
        &mut self.cache
    }
}

pub(crate) static ORPHAN_BOUND: FieldAccessor<Orphan, i64> =
    FieldAccessor::new("bound").computed_by(Orphan::compute_bound);

pub(crate) static ORPHAN_UNBOUND: FieldAccessor<Orphan, bool> = FieldAccessor::new("unbound");

static ORPHAN_FIELDS: Lazy<FieldRegistry<Orphan>> = Lazy::new(|| {
    FieldRegistry::builder()
        .field(&ORPHAN_BOUND)
        .field(&ORPHAN_UNBOUND)
        .build()
});

/// Entity declaring a field without a compute binding.
pub(crate) struct Orphan {
    cache: CacheContext,
}

impl Orphan {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        let mut orphan = Self {
            cache: CacheContext::new(store),
        };
        orphan.set_key_suffix([1]);
        orphan
    }

    fn compute_bound(&self) -> FieldCacheResult<i64> {
        Ok(1)
    }
}

impl CacheEntity for Orphan {
    fn entity_type() -> EntityTypeId {
        EntityTypeId::new("tests", "Orphan")
    }

    fn fields() -> &'static FieldRegistry<Self> {
        &ORPHAN_FIELDS
    }

    fn cache(&self) -> &CacheContext {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut CacheContext {
        &mut self.cache
    }
}

/// Store whose every operation fails.
#[derive(Debug, Default)]
pub(crate) struct BrokenStore;

impl CacheStore for BrokenStore {
    fn get(&self, _key: &str) -> FieldCacheResult<Option<String>> {
        Err(StoreError::Backend {
            reason: "connection refused".to_string(),
        }
        .into())
    }

    fn set(&self, _key: &str, _raw: &str, _ttl: Option<Duration>) -> FieldCacheResult<()> {
        Err(StoreError::Backend {
            reason: "connection refused".to_string(),
        }
        .into())
    }

    fn delete(&self, _key: &str) -> FieldCacheResult<bool> {
        Ok(false)
    }

    fn stats(&self) -> FieldCacheResult<CacheStats> {
        Ok(CacheStats::default())
    }
}
