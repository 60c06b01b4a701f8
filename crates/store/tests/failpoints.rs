//! Fail-point injection into the retry loop.
//!
//! Requires the `failpoints` feature:
//! ```bash
//! cargo test -p cmdb-store --features failpoints --test failpoints
//! ```

#![cfg(feature = "failpoints")]
#![allow(clippy::expect_used)]

use cmdb_resource::{Kind, testutil::fixture};
use cmdb_storage::{MemoryBackend, StorageError, testutil::FaultyBackend};
use cmdb_store::{Store, StoreConfig};

#[tokio::test]
async fn failure_before_retry_sleep_aborts_the_write() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("cas-retry-before-sleep", "return").expect("failed to configure fail point");

    let backend = FaultyBackend::new(MemoryBackend::new());
    backend.fail_commits(1, StorageError::conflict());
    let store = Store::new(backend.clone(), StoreConfig::default());

    let err = store.create(fixture(Kind::Secret)).await.expect_err("fail point should abort");
    assert!(err.is_internal(), "{err:?}");
    assert!(backend.inner().is_empty());

    scenario.teardown();
}

#[tokio::test]
async fn retry_proceeds_without_fail_point() {
    let scenario = fail::FailScenario::setup();

    let backend = FaultyBackend::new(MemoryBackend::new());
    backend.fail_commits(1, StorageError::conflict());
    let store = Store::new(backend.clone(), StoreConfig::default());

    store.create(fixture(Kind::Secret)).await.expect("create after one retry");
    assert_eq!(backend.pending_faults(), 0);

    scenario.teardown();
}
