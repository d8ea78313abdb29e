//! FieldCache Orgs - Organization Resource Caches
//!
//! Example domain built on the field cache: per-organization member and
//! group counts, computed from an [`OrgDirectory`] and cached per org id.

pub mod caches;
pub mod directory;

pub use caches::{OrgResourceCache, GROUP_AMOUNT, USER_AMOUNT};
pub use directory::{DirectoryError, InMemoryOrgDirectory, OrgDirectory, OrgId, UserId};
