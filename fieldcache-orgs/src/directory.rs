//! Organization membership data the org caches are computed from.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use fieldcache_core::{ComputeError, FieldCacheError, FieldCacheResult};
use thiserror::Error;

/// Organization identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrgId(pub u64);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised by directory lookups.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("org directory lock poisoned")]
    LockPoisoned,

    #[error("org directory unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<DirectoryError> for FieldCacheError {
    fn from(e: DirectoryError) -> Self {
        FieldCacheError::Compute(ComputeError::Failed {
            binding: "org_directory".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Read access to organization membership.
pub trait OrgDirectory: Send + Sync {
    /// Number of distinct users holding at least one membership in `org_id`.
    fn distinct_member_count(&self, org_id: OrgId) -> FieldCacheResult<i64>;

    /// Number of distinct user groups defined in `org_id`.
    fn group_count(&self, org_id: OrgId) -> FieldCacheResult<i64>;
}

/// Thread-safe in-memory directory that counts how often it is queried.
///
/// A user may hold several memberships in one org (one per role); they
/// count once.
#[derive(Debug, Default)]
pub struct InMemoryOrgDirectory {
    memberships: RwLock<Vec<(OrgId, UserId)>>,
    groups: RwLock<HashMap<OrgId, HashSet<String>>>,
    member_queries: AtomicUsize,
    group_queries: AtomicUsize,
    offline: RwLock<Option<String>>,
}

impl InMemoryOrgDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a membership row.
    pub fn add_member(&self, org_id: OrgId, user_id: UserId) -> Result<(), DirectoryError> {
        self.memberships
            .write()
            .map_err(|_| DirectoryError::LockPoisoned)?
            .push((org_id, user_id));
        Ok(())
    }

    /// Drop every membership row of `user_id` in `org_id`. Returns how many were removed.
    pub fn remove_member(&self, org_id: OrgId, user_id: UserId) -> Result<usize, DirectoryError> {
        let mut memberships = self
            .memberships
            .write()
            .map_err(|_| DirectoryError::LockPoisoned)?;
        let before = memberships.len();
        memberships.retain(|row| *row != (org_id, user_id));
        Ok(before - memberships.len())
    }

    /// Define a group. Returns `false` if the org already had it.
    pub fn add_group(&self, org_id: OrgId, name: impl Into<String>) -> Result<bool, DirectoryError> {
        Ok(self
            .groups
            .write()
            .map_err(|_| DirectoryError::LockPoisoned)?
            .entry(org_id)
            .or_default()
            .insert(name.into()))
    }

    /// Make every query fail until [`set_online`](Self::set_online) is called.
    pub fn set_offline(&self, reason: impl Into<String>) -> Result<(), DirectoryError> {
        *self.offline.write().map_err(|_| DirectoryError::LockPoisoned)? = Some(reason.into());
        Ok(())
    }

    pub fn set_online(&self) -> Result<(), DirectoryError> {
        *self.offline.write().map_err(|_| DirectoryError::LockPoisoned)? = None;
        Ok(())
    }

    pub fn member_queries(&self) -> usize {
        self.member_queries.load(Ordering::SeqCst)
    }

    pub fn group_queries(&self) -> usize {
        self.group_queries.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<(), DirectoryError> {
        match &*self.offline.read().map_err(|_| DirectoryError::LockPoisoned)? {
            Some(reason) => Err(DirectoryError::Unavailable {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl OrgDirectory for InMemoryOrgDirectory {
    fn distinct_member_count(&self, org_id: OrgId) -> FieldCacheResult<i64> {
        self.member_queries.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        let memberships = self
            .memberships
            .read()
            .map_err(|_| DirectoryError::LockPoisoned)?;
        let users: HashSet<UserId> = memberships
            .iter()
            .filter(|(org, _)| *org == org_id)
            .map(|(_, user)| *user)
            .collect();
        Ok(users.len() as i64)
    }

    fn group_count(&self, org_id: OrgId) -> FieldCacheResult<i64> {
        self.group_queries.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        let groups = self.groups.read().map_err(|_| DirectoryError::LockPoisoned)?;
        Ok(groups.get(&org_id).map_or(0, |names| names.len() as i64))
    }
}
