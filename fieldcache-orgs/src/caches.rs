//! Per-organization resource counters.

use std::fmt;
use std::sync::Arc;

use fieldcache_core::{FieldCacheConfig, FieldCacheResult};
use fieldcache_storage::{
    CacheContext, CacheEntity, CacheStore, EntityTypeId, FieldAccessor, FieldRegistry,
};
use once_cell::sync::Lazy;

use crate::directory::{OrgDirectory, OrgId};

/// Distinct members of the organization.
pub static USER_AMOUNT: FieldAccessor<OrgResourceCache, i64> =
    FieldAccessor::new("user_amount").computed_by(OrgResourceCache::compute_user_amount);

/// User groups defined in the organization.
pub static GROUP_AMOUNT: FieldAccessor<OrgResourceCache, i64> =
    FieldAccessor::new("group_amount").computed_by(OrgResourceCache::compute_group_amount);

static ORG_RESOURCE_FIELDS: Lazy<FieldRegistry<OrgResourceCache>> = Lazy::new(|| {
    FieldRegistry::builder()
        .field(&USER_AMOUNT)
        .field(&GROUP_AMOUNT)
        .build()
});

/// Cached resource counts for one organization, keyed by its id.
pub struct OrgResourceCache {
    org_id: OrgId,
    directory: Arc<dyn OrgDirectory>,
    cache: CacheContext,
}

impl OrgResourceCache {
    pub fn new(org_id: OrgId, directory: Arc<dyn OrgDirectory>, store: Arc<dyn CacheStore>) -> Self {
        Self::with_context(org_id, directory, CacheContext::new(store))
    }

    /// Take key prefix and coercion policy from `config`.
    pub fn with_config(
        org_id: OrgId,
        directory: Arc<dyn OrgDirectory>,
        store: Arc<dyn CacheStore>,
        config: &FieldCacheConfig,
    ) -> Self {
        Self::with_context(org_id, directory, CacheContext::with_config(store, config))
    }

    fn with_context(org_id: OrgId, directory: Arc<dyn OrgDirectory>, cache: CacheContext) -> Self {
        let mut org_cache = Self {
            org_id,
            directory,
            cache,
        };
        org_cache.set_key_suffix([org_id]);
        org_cache
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn user_amount(&self) -> FieldCacheResult<i64> {
        self.get(&USER_AMOUNT)
    }

    pub fn group_amount(&self) -> FieldCacheResult<i64> {
        self.get(&GROUP_AMOUNT)
    }

    fn compute_user_amount(&self) -> FieldCacheResult<i64> {
        let user_amount = self.directory.distinct_member_count(self.org_id)?;
        tracing::debug!(org_id = %self.org_id, user_amount, "compute_user_amount");
        Ok(user_amount)
    }

    fn compute_group_amount(&self) -> FieldCacheResult<i64> {
        let group_amount = self.directory.group_count(self.org_id)?;
        tracing::debug!(org_id = %self.org_id, group_amount, "compute_group_amount");
        Ok(group_amount)
    }
}

impl CacheEntity for OrgResourceCache {
    fn entity_type() -> EntityTypeId {
        EntityTypeId::new("orgs.caches", "OrgResourceCache")
    }

    fn fields() -> &'static FieldRegistry<Self> {
        &ORG_RESOURCE_FIELDS
    }

    fn cache(&self) -> &CacheContext {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut CacheContext {
        &mut self.cache
    }
}

impl fmt::Debug for OrgResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrgResourceCache")
            .field("org_id", &self.org_id)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::directory::InMemoryOrgDirectory;
    use fieldcache_storage::InMemoryStore;
    use proptest::prelude::*;

    fn org_cache(org_id: u64) -> OrgResourceCache {
        OrgResourceCache::new(
            OrgId(org_id),
            Arc::new(InMemoryOrgDirectory::new()),
            Arc::new(InMemoryStore::new()),
        )
    }

    proptest! {
        #[test]
        fn prop_key_ends_with_org_id(org_id in any::<u64>()) {
            let key = USER_AMOUNT.cache_key(&org_cache(org_id));
            let expected_suffix = format!(".user_amount.{}", org_id);
            prop_assert!(key.as_str().ends_with(&expected_suffix));
        }

        #[test]
        fn prop_distinct_orgs_never_share_keys(a in any::<u64>(), b in any::<u64>()) {
            prop_assume!(a != b);
            prop_assert_ne!(
                GROUP_AMOUNT.cache_key(&org_cache(a)),
                GROUP_AMOUNT.cache_key(&org_cache(b))
            );
        }
    }
}
