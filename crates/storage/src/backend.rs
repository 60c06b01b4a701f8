//! Key-value backend trait definition.
//!
//! [`KvBackend`] is the seam between the resource store and whatever holds
//! the bytes. It models a revisioned key space in the style of etcd: every
//! committed write advances a global revision, and every key remembers the
//! revision that created it and the revision that last touched it.
//!
//! # Implementing a Backend
//!
//! 1. Implement [`KvBackend`]
//! 2. Implement a matching [`Transaction`] type whose `commit` evaluates every
//!    [`Compare`](crate::Compare) guard and applies all writes atomically
//! 3. Map backend failures onto [`StorageError`](crate::StorageError)
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use async_trait::async_trait;

use crate::{
    error::StorageResult,
    health::{HealthProbe, HealthStatus},
    transaction::Transaction,
    types::{KeyValue, RangeRequest, RangeResponse},
};

/// Abstract revisioned key-value backend.
///
/// Implementations must be thread-safe and the trait is object-safe, so the
/// store can hold either a concrete backend or an `Arc<dyn KvBackend>`.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](KvBackend::get) | Read one key with its revisions |
/// | [`range`](KvBackend::range) | Prefix or range read with sort, limit and revision bounds |
/// | [`put`](KvBackend::put) | Unconditional write |
/// | [`delete`](KvBackend::delete) | Unconditional delete |
/// | [`delete_prefix`](KvBackend::delete_prefix) | Remove every key under a prefix |
/// | [`transaction`](KvBackend::transaction) | Begin a guarded transaction |
/// | [`health_check`](KvBackend::health_check) | Probe availability |
///
/// # Example
///
/// ```
/// use cmdb_storage::{KvBackend, MemoryBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// let revision = backend.put(b"/registry/zones/z1".to_vec(), b"{}".to_vec()).await.unwrap();
/// let kv = backend.get(b"/registry/zones/z1").await.unwrap().unwrap();
/// assert_eq!(kv.create_revision, revision);
/// assert_eq!(kv.version, 1);
/// # });
/// ```
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Reads a single key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<KeyValue>>;

    /// Executes a range read.
    ///
    /// The creation-revision bounds are applied before `limit`, and the
    /// reported `count` reflects every key that passed the bounds.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn range(&self, request: RangeRequest) -> StorageResult<RangeResponse>;

    /// Writes a key unconditionally and returns the new store revision.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<i64>;

    /// Deletes a key. Returns `true` if the key existed.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<bool>;

    /// Deletes every key starting with `prefix` and returns how many were
    /// removed.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete_prefix(&self, prefix: &[u8]) -> StorageResult<u64>;

    /// Begins a new guarded transaction.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>>;

    /// Checks backend health for the given probe type.
    ///
    /// Unlike the other operations this never fails; problems are reported
    /// through [`HealthStatus::Unhealthy`].
    async fn health_check(&self, probe: HealthProbe) -> HealthStatus;
}

#[async_trait]
impl<B: KvBackend + ?Sized> KvBackend for std::sync::Arc<B> {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<KeyValue>> {
        (**self).get(key).await
    }

    async fn range(&self, request: RangeRequest) -> StorageResult<RangeResponse> {
        (**self).range(request).await
    }

    async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<i64> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<bool> {
        (**self).delete(key).await
    }

    async fn delete_prefix(&self, prefix: &[u8]) -> StorageResult<u64> {
        (**self).delete_prefix(prefix).await
    }

    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        (**self).transaction().await
    }

    async fn health_check(&self, probe: HealthProbe) -> HealthStatus {
        (**self).health_check(probe).await
    }
}
