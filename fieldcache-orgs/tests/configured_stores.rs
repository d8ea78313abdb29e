//! `OrgResourceCache` over stores opened from configuration.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fieldcache_core::FieldCacheConfig;
use fieldcache_orgs::{InMemoryOrgDirectory, OrgId, OrgResourceCache, UserId, USER_AMOUNT};
use fieldcache_storage::{open_store, CacheEntity, CacheStore, InMemoryStore, LmdbStore};
use fieldcache_test_utils::{fixtures, init_test_tracing, RecordingStore};

fn directory_with_members(org_id: OrgId, members: u64) -> Arc<InMemoryOrgDirectory> {
    let directory = Arc::new(InMemoryOrgDirectory::new());
    for user in 0..members {
        directory
            .add_member(org_id, UserId(user))
            .expect("add should succeed");
    }
    directory
}

#[test]
fn test_config_file_drives_prefix_and_store() {
    init_test_tracing();
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let config_path = dir.path().join("fieldcache.toml");
    let mut file = std::fs::File::create(&config_path).expect("config file should be created");
    write!(
        file,
        r#"
key_prefix = "tenant7"
coercion = "fail_closed"

[store]
default_ttl_secs = 600

[store.lmdb]
path = "{}"
max_size_mb = 16
"#,
        dir.path().join("lmdb").display()
    )
    .expect("config should be written");

    let config = FieldCacheConfig::from_path(&config_path).expect("config should load");
    let store = open_store(&config.store).expect("store should open");
    let org_cache =
        OrgResourceCache::with_config(OrgId(42), directory_with_members(OrgId(42), 4), store.clone(), &config);

    assert_eq!(
        USER_AMOUNT.cache_key(&org_cache).as_str(),
        "tenant7.orgs.caches.OrgResourceCache.user_amount.42"
    );
    assert_eq!(org_cache.user_amount().expect("read should succeed"), 4);
    assert_eq!(
        store
            .get("tenant7.orgs.caches.OrgResourceCache.user_amount.42")
            .expect("get should succeed"),
        Some("4".to_string())
    );
}

#[test]
fn test_lmdb_entries_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir should be created");

    {
        let store = fixtures::lmdb_store(dir.path()).expect("lmdb should open");
        let org_cache = OrgResourceCache::new(OrgId(5), directory_with_members(OrgId(5), 3), store);
        assert_eq!(org_cache.user_amount().expect("read should succeed"), 3);
    }

    let store = fixtures::lmdb_store(dir.path()).expect("lmdb should reopen");
    let directory = directory_with_members(OrgId(5), 9);
    let org_cache = OrgResourceCache::new(OrgId(5), directory.clone(), store);

    let read = org_cache.read(&USER_AMOUNT).expect("read should succeed");
    assert!(read.was_cache_hit());
    assert_eq!(read.into_value(), 3);
    assert_eq!(directory.member_queries(), 0);
}

#[test]
fn test_lmdb_default_ttl_expires_entries() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let store: Arc<dyn CacheStore> = Arc::new(
        LmdbStore::new(dir.path().join("cache"), 16)
            .expect("lmdb should open")
            .with_default_ttl(Some(Duration::from_millis(30))),
    );
    let directory = directory_with_members(OrgId(8), 2);
    let org_cache = OrgResourceCache::new(OrgId(8), directory.clone(), store);

    assert_eq!(org_cache.user_amount().expect("read should succeed"), 2);
    thread::sleep(Duration::from_millis(80));
    let read = org_cache.read(&USER_AMOUNT).expect("read should succeed");

    assert!(read.was_cache_miss());
    assert_eq!(directory.member_queries(), 2);
}

#[test]
fn test_store_default_ttl_reaches_recording_store() {
    let store = Arc::new(RecordingStore::wrapping(InMemoryStore::with_default_ttl(
        Duration::from_millis(30),
    )));
    let directory = directory_with_members(OrgId(9), 1);
    let org_cache = OrgResourceCache::new(OrgId(9), directory.clone(), store.clone());

    org_cache.user_amount().expect("read should succeed");
    assert_eq!(store.writes()[0].ttl, None, "fields declare no ttl");

    thread::sleep(Duration::from_millis(80));
    org_cache.user_amount().expect("read should succeed");
    assert_eq!(directory.member_queries(), 2);
    assert_eq!(store.set_count(), 2);
}

#[test]
fn test_repointing_suffix_moves_to_new_entries() {
    let store = fixtures::memory_store();
    let directory = directory_with_members(OrgId(1), 2);
    let mut org_cache = OrgResourceCache::new(OrgId(1), directory.clone(), store.clone());
    org_cache.user_amount().expect("read should succeed");

    org_cache.set_key_suffix(["1", "archived"]);

    assert_eq!(
        USER_AMOUNT.cache_key(&org_cache).as_str(),
        "cache.orgs.caches.OrgResourceCache.user_amount.1.archived"
    );
    org_cache.user_amount().expect("read should succeed");
    assert_eq!(directory.member_queries(), 2);
    assert_eq!(store.len().expect("len should succeed"), 2);
}
