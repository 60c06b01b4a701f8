//! Updates, revision guards and the retry loop.

#![allow(clippy::expect_used, clippy::panic)]

use std::time::Duration;

use cmdb_resource::{
    Kind, Object,
    testutil::{FIXTURE_NAME, fixture},
};
use cmdb_storage::{KvBackend, MemoryBackend, StorageError, testutil::FaultyBackend};
use cmdb_store::{CasRetryConfig, GetOptions, Store, StoreConfig, StoreError};

fn labelled(key: &str, value: &str) -> Object {
    let mut secret = fixture(Kind::Secret);
    secret.meta_mut().labels.insert(key.into(), value.into());
    secret
}

fn faulty_store(config: StoreConfig) -> (FaultyBackend, Store<FaultyBackend>) {
    let backend = FaultyBackend::new(MemoryBackend::new());
    (backend.clone(), Store::new(backend, config))
}

fn quick_retries(max_retries: u32) -> StoreConfig {
    StoreConfig::builder()
        .cas_retry(
            CasRetryConfig::builder()
                .max_retries(max_retries)
                .base_delay(Duration::from_millis(1))
                .build()
                .expect("retry config"),
        )
        .build()
        .expect("store config")
}

// ============================================================================
// Update semantics
// ============================================================================

#[tokio::test]
async fn unchanged_update_writes_nothing() {
    let store = Store::new(MemoryBackend::new(), StoreConfig::default());
    let created = store.create(fixture(Kind::Secret)).await.expect("create");
    let revision = store.backend().revision();

    assert!(store.update(fixture(Kind::Secret)).await.expect("update").is_none());
    assert!(store.update(created.clone()).await.expect("update").is_none());
    assert_eq!(store.backend().revision(), revision);
}

#[tokio::test]
async fn changed_update_advances_counters_and_keeps_creation() {
    let store = Store::new(MemoryBackend::new(), StoreConfig::default());
    let created = store.create(fixture(Kind::Secret)).await.expect("create");

    let updated = store.update(labelled("tier", "gold")).await.expect("update").expect("changed");
    let (before, after) = (created.meta(), updated.meta());
    assert_eq!(after.version, 2);
    assert_eq!(after.create_revision, before.create_revision);
    assert!(after.revision > before.revision);
    assert_eq!(after.creation_timestamp, before.creation_timestamp);
    assert!(after.managed_fields.time >= before.managed_fields.time);

    let read = store
        .get("Secret", FIXTURE_NAME, "", &GetOptions::default())
        .await
        .expect("get")
        .expect("present");
    assert_eq!(read, updated);
}

#[tokio::test]
async fn caller_supplied_counters_are_ignored_on_update() {
    let store = Store::new(MemoryBackend::new(), StoreConfig::default());
    store.create(fixture(Kind::Secret)).await.expect("create");

    let mut stale = labelled("tier", "gold");
    stale.meta_mut().revision = 999;
    stale.meta_mut().version = 42;
    let updated = store.update(stale).await.expect("update").expect("changed");
    assert_eq!(updated.meta().version, 2);
}

#[tokio::test]
async fn update_of_missing_object_is_not_found() {
    let store = Store::new(MemoryBackend::new(), StoreConfig::default());
    let err = store.update(fixture(Kind::Secret)).await.unwrap_err();
    assert!(matches!(err, StoreError::KeyNotFound { .. }), "{err:?}");
}

// ============================================================================
// Retry loop
// ============================================================================

#[tokio::test]
async fn transient_conflicts_are_retried() {
    let (backend, store) = faulty_store(quick_retries(5));
    backend.fail_commits(3, StorageError::conflict());

    store.create(fixture(Kind::Secret)).await.expect("create after retries");
    assert_eq!(backend.pending_faults(), 0);

    backend.fail_commits(2, StorageError::conflict());
    let updated = store.update(labelled("a", "b")).await.expect("update").expect("changed");
    assert_eq!(updated.meta().version, 2);

    backend.fail_commits(2, StorageError::conflict());
    store.delete("Secret", FIXTURE_NAME, "").await.expect("delete after retries");
    assert!(backend.inner().is_empty());
}

#[tokio::test]
async fn sustained_conflicts_exhaust_retries() {
    let (backend, store) = faulty_store(quick_retries(2));
    backend.fail_commits(10, StorageError::conflict());

    match store.create(fixture(Kind::Secret)).await {
        Err(err @ StoreError::CasRetriesExhausted { attempts, .. }) => {
            assert_eq!(attempts, 3);
            assert_eq!(err.status_code(), 409);
        },
        other => panic!("expected CasRetriesExhausted, got {other:?}"),
    }
    assert_eq!(backend.pending_faults(), 7);
    assert!(backend.inner().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_the_retry_loop() {
    let config = StoreConfig::builder()
        .operation_timeout(Duration::from_millis(50))
        .cas_retry(
            CasRetryConfig::builder()
                .base_delay(Duration::from_secs(1))
                .build()
                .expect("retry config"),
        )
        .build()
        .expect("store config");
    let (backend, store) = faulty_store(config);
    backend.fail_commits(100, StorageError::conflict());

    let err = store.create(fixture(Kind::Secret)).await.unwrap_err();
    assert!(matches!(err, StoreError::Timeout { .. }), "{err:?}");
    assert_eq!(err.status_code(), 504);
}

#[tokio::test]
async fn backend_failures_are_not_retried() {
    let (backend, store) = faulty_store(quick_retries(5));
    backend.fail_commits(2, StorageError::connection("etcd unreachable"));

    let err = store.create(fixture(Kind::Secret)).await.unwrap_err();
    assert!(err.is_internal(), "{err:?}");
    assert!(err.is_transient());
    assert_eq!(backend.pending_faults(), 1);
}

// ============================================================================
// Racing writers
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_updates_all_land() {
    const WRITERS: usize = 8;
    let store = Store::new(MemoryBackend::new(), StoreConfig::default());
    store.create(fixture(Kind::Secret)).await.expect("create");

    let mut handles = Vec::with_capacity(WRITERS);
    for writer in 0..WRITERS {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.update(labelled("writer", &writer.to_string())).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("update").expect("changed");
    }

    let read = store
        .get("Secret", FIXTURE_NAME, "", &GetOptions::default())
        .await
        .expect("get")
        .expect("present");
    assert_eq!(read.meta().version, 1 + WRITERS as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_have_one_winner() {
    const WRITERS: usize = 8;
    let store = Store::new(MemoryBackend::new(), StoreConfig::default());

    let mut handles = Vec::with_capacity(WRITERS);
    for _ in 0..WRITERS {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.create(fixture(Kind::Secret)).await }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => created += 1,
            Err(err) => assert!(err.is_exists(), "{err:?}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(store.backend().get(b"/registry/secrets/test").await.expect("get").expect("present").version, 1);
}
