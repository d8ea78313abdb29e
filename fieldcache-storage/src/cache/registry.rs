//! Per-type field registries.
//!
//! Every entity type declares its fields once, in order, in a lazily built
//! [`FieldRegistry`]. The registry erases each accessor's value type so that
//! fields of different types can be refreshed by name.

use std::collections::HashSet;
use std::fmt;

use fieldcache_core::{FieldCacheResult, FieldValue, SchemaError};

use super::accessor::FieldAccessor;
use super::entity::CacheEntity;
use super::key::CacheKey;
use super::schema::FieldSchema;

/// A field accessor with its value type erased.
///
/// Implemented for every [`FieldAccessor`]; entity code never implements it
/// directly.
pub trait RegisteredField<E>: Send + Sync {
    /// The field's declared schema.
    fn schema(&self) -> &FieldSchema;

    /// Whether a compute function was bound at declaration.
    fn has_compute_binding(&self) -> bool;

    /// Key this field resolves to for `entity`.
    fn cache_key(&self, entity: &E) -> CacheKey;

    /// Recompute and store, discarding the typed value.
    fn refresh_erased(&self, entity: &E) -> FieldCacheResult<()>;
}

impl<E, T> RegisteredField<E> for FieldAccessor<E, T>
where
    E: CacheEntity,
    T: FieldValue + 'static,
{
    fn schema(&self) -> &FieldSchema {
        FieldAccessor::schema(self)
    }

    fn has_compute_binding(&self) -> bool {
        FieldAccessor::has_compute_binding(self)
    }

    fn cache_key(&self, entity: &E) -> CacheKey {
        FieldAccessor::cache_key(self, entity)
    }

    fn refresh_erased(&self, entity: &E) -> FieldCacheResult<()> {
        self.refresh(entity).map(|_| ())
    }
}

/// Ordered set of an entity type's fields.
pub struct FieldRegistry<E: 'static> {
    fields: Vec<&'static dyn RegisteredField<E>>,
}

impl<E: 'static> FieldRegistry<E> {
    pub fn builder() -> FieldRegistryBuilder<E> {
        FieldRegistryBuilder { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'static dyn RegisteredField<E>> + '_ {
        self.fields.iter().copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.schema().name())
    }

    /// Whether `field` is one of the declared accessors, by identity.
    pub fn contains<T>(&self, field: &FieldAccessor<E, T>) -> bool {
        let target = (field as *const FieldAccessor<E, T>).cast::<()>();
        self.fields.iter().any(|registered| {
            std::ptr::eq((*registered as *const dyn RegisteredField<E>).cast::<()>(), target)
        })
    }

    /// Look a field up by name. The first declaration wins.
    pub fn get(&self, name: &str) -> Option<&'static dyn RegisteredField<E>> {
        self.fields
            .iter()
            .copied()
            .find(|field| field.schema().name() == name)
    }
}

impl<E: CacheEntity> FieldRegistry<E> {
    /// Look a field up by name, failing with [`SchemaError::UnknownField`].
    pub fn resolve(&self, name: &str) -> Result<&'static dyn RegisteredField<E>, SchemaError> {
        self.get(name).ok_or_else(|| SchemaError::UnknownField {
            entity: E::entity_type().to_string(),
            field: name.to_string(),
        })
    }

    /// Check that field names are unique and every field has a compute binding.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::with_capacity(self.fields.len());
        for name in self.names() {
            if !seen.insert(name) {
                return Err(SchemaError::DuplicateField {
                    entity: E::entity_type().to_string(),
                    field: name.to_string(),
                });
            }
        }

        match self.fields.iter().find(|field| !field.has_compute_binding()) {
            Some(field) => Err(SchemaError::MissingComputeBinding {
                entity: E::entity_type().to_string(),
                field: field.schema().name().to_string(),
                binding: field.schema().compute_binding_name().into_owned(),
            }),
            None => Ok(()),
        }
    }

    /// Refresh the named fields of `entity` in the given order, or every
    /// field when `names` is empty.
    ///
    /// All names are resolved before anything is computed. The first failing
    /// field stops the loop; fields refreshed before it keep their new values.
    pub fn refresh(&self, entity: &E, names: &[&str]) -> FieldCacheResult<()> {
        let targets = if names.is_empty() {
            self.fields.clone()
        } else {
            names
                .iter()
                .map(|name| self.resolve(name))
                .collect::<Result<Vec<_>, _>>()?
        };

        tracing::debug!(
            entity = %E::entity_type(),
            suffix = %entity.cache().key_suffix(),
            fields = targets.len(),
            "refreshing cache fields"
        );

        for field in targets {
            field.refresh_erased(entity)?;
        }
        Ok(())
    }
}

impl<E: 'static> fmt::Debug for FieldRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields.iter().map(|field| field.schema())).finish()
    }
}

/// Collects fields in declaration order.
pub struct FieldRegistryBuilder<E: 'static> {
    fields: Vec<&'static dyn RegisteredField<E>>,
}

impl<E: 'static> FieldRegistryBuilder<E> {
    pub fn field(mut self, field: &'static dyn RegisteredField<E>) -> Self {
        self.fields.push(field);
        self
    }

    /// Finish the registry. Duplicates and missing bindings are reported by
    /// [`FieldRegistry::validate`], not here.
    pub fn build(self) -> FieldRegistry<E> {
        FieldRegistry {
            fields: self.fields,
        }
    }
}
