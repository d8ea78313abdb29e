//! The field accessor protocol: get-or-compute-and-store and refresh.
//!
//! A [`FieldAccessor`] binds one [`FieldSchema`] to the entity type that
//! declares it and to the function that computes it. Accessors are `static`
//! items shared by every instance; all per-instance state (store handle, key
//! suffix) comes from the entity's [`CacheContext`](super::CacheContext).
//!
//! # Concurrency
//!
//! There is no single-flight. Two callers that miss on the same key at the
//! same time both run the compute binding and both write; the last write
//! wins.

use fieldcache_core::{
    CoercionError, CoercionPolicy, FieldCacheResult, FieldValue, SchemaError,
};
use std::time::Duration;

use super::entity::CacheEntity;
use super::key::CacheKey;
use super::schema::FieldSchema;

/// A compute binding: produces a field's value from the entity.
pub type ComputeFn<E, T> = fn(&E) -> FieldCacheResult<T>;

/// How a read obtained its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Decoded from the store.
    Hit,
    /// The store had nothing; the value was computed and stored.
    Computed,
    /// The stored value failed to decode and was recomputed and overwritten.
    Recovered,
}

/// Result of a field read, carrying the key and whether the store was hit.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRead<T> {
    key: CacheKey,
    value: T,
    outcome: ReadOutcome,
}

impl<T> FieldRead<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn outcome(&self) -> ReadOutcome {
        self.outcome
    }

    pub fn was_cache_hit(&self) -> bool {
        self.outcome == ReadOutcome::Hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit()
    }
}

/// Runtime handle for one cache field of entity type `E` holding a `T`.
///
/// The accessor must also be listed in `E::fields()`. Reads and refreshes
/// through an unlisted accessor fail with [`SchemaError::UnknownField`].
///
/// # Example
///
/// ```ignore
/// static USER_AMOUNT: FieldAccessor<OrgResourceCache, i64> =
///     FieldAccessor::new("user_amount").computed_by(OrgResourceCache::compute_user_amount);
///
/// let amount = USER_AMOUNT.get(&org_cache)?;
/// ```
pub struct FieldAccessor<E, T> {
    schema: FieldSchema,
    compute: Option<ComputeFn<E, T>>,
}

impl<E, T: FieldValue> FieldAccessor<E, T> {
    /// Declare a field. Its kind follows from `T`.
    pub const fn new(name: &'static str) -> Self {
        Self {
            schema: FieldSchema::new(name, T::KIND),
            compute: None,
        }
    }

    pub const fn with_ttl(self, ttl: Duration) -> Self {
        Self {
            schema: self.schema.with_ttl(ttl),
            compute: self.compute,
        }
    }

    pub const fn with_compute_binding(self, binding: &'static str) -> Self {
        Self {
            schema: self.schema.with_compute_binding(binding),
            compute: self.compute,
        }
    }

    /// Bind the function that computes this field.
    pub const fn computed_by(self, compute: ComputeFn<E, T>) -> Self {
        Self {
            schema: self.schema,
            compute: Some(compute),
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn name(&self) -> &'static str {
        self.schema.name()
    }

    pub fn has_compute_binding(&self) -> bool {
        self.compute.is_some()
    }
}

impl<E: CacheEntity, T: FieldValue> FieldAccessor<E, T> {
    /// Derive this field's key for `entity`.
    pub fn cache_key(&self, entity: &E) -> CacheKey {
        let cache = entity.cache();
        cache
            .key_builder()
            .build(&E::entity_type(), self.schema.name(), cache.key_suffix())
    }

    /// Return the stored value, or compute, store and return a fresh one.
    pub fn get(&self, entity: &E) -> FieldCacheResult<T> {
        self.read(entity).map(FieldRead::into_value)
    }

    /// Like [`get`](Self::get), also reporting whether the store was hit.
    pub fn read(&self, entity: &E) -> FieldCacheResult<FieldRead<T>> {
        self.ensure_registered()?;
        let compute = self.resolve_binding()?;
        let key = self.cache_key(entity);
        let cache = entity.cache();

        let mut outcome = ReadOutcome::Computed;
        if let Some(raw) = cache.store().get(key.as_str())? {
            match T::decode(&raw) {
                Ok(value) => {
                    return Ok(FieldRead {
                        key,
                        value,
                        outcome: ReadOutcome::Hit,
                    })
                }
                Err(reason) => match cache.coercion_policy() {
                    CoercionPolicy::FailClosed => {
                        return Err(CoercionError::Invalid {
                            key: key.into_string(),
                            kind: self.schema.kind(),
                            raw,
                            reason,
                        }
                        .into());
                    }
                    CoercionPolicy::Recompute => {
                        tracing::warn!(
                            target: "fieldcache::coercion",
                            key = %key,
                            kind = %self.schema.kind(),
                            raw = %raw,
                            reason = %reason,
                            "stored value failed to decode, recomputing"
                        );
                        outcome = ReadOutcome::Recovered;
                    }
                },
            }
        }

        let value = self.compute_and_store(entity, compute, &key)?;
        Ok(FieldRead {
            key,
            value,
            outcome,
        })
    }

    /// Recompute and overwrite the stored value, skipping the store read.
    pub fn refresh(&self, entity: &E) -> FieldCacheResult<T> {
        self.ensure_registered()?;
        let compute = self.resolve_binding()?;
        let key = self.cache_key(entity);
        self.compute_and_store(entity, compute, &key)
    }

    /// An accessor missing from `E::fields()` is not a field of `E`.
    fn ensure_registered(&self) -> Result<(), SchemaError> {
        if E::fields().contains(self) {
            Ok(())
        } else {
            Err(SchemaError::UnknownField {
                entity: E::entity_type().to_string(),
                field: self.schema.name().to_string(),
            })
        }
    }

    fn resolve_binding(&self) -> Result<ComputeFn<E, T>, SchemaError> {
        self.compute
            .ok_or_else(|| SchemaError::MissingComputeBinding {
                entity: E::entity_type().to_string(),
                field: self.schema.name().to_string(),
                binding: self.schema.compute_binding_name().into_owned(),
            })
    }

    fn compute_and_store(
        &self,
        entity: &E,
        compute: ComputeFn<E, T>,
        key: &CacheKey,
    ) -> FieldCacheResult<T> {
        let value = compute(entity)?;
        let raw = value.encode();
        entity
            .cache()
            .store()
            .set(key.as_str(), &raw, self.schema.ttl())?;
        tracing::info!(
            target: "fieldcache::refresh",
            key = %key,
            binding = %self.schema.compute_binding_name(),
            "refresh_cache"
        );
        Ok(value)
    }
}
