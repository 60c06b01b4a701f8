//! In-memory revisioned backend.
//!
//! [`MemoryBackend`] keeps every key in a [`BTreeMap`] behind a single
//! [`parking_lot::RwLock`], together with the global revision counter. A
//! transaction commit holds the write lock for the whole compare-and-apply
//! step, which gives the same atomicity an etcd `Txn` provides.
//!
//! # Example
//!
//! ```
//! use cmdb_storage::{KvBackend, MemoryBackend, RangeRequest};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//! backend.put(b"/registry/zones/a".to_vec(), b"{}".to_vec()).await.unwrap();
//! backend.put(b"/registry/zones/b".to_vec(), b"{}".to_vec()).await.unwrap();
//!
//! let response = backend.range(RangeRequest::prefix("/registry/zones/").count_only()).await.unwrap();
//! assert_eq!(response.count, 2);
//! assert!(response.kvs.is_empty());
//! # });
//! ```
//!
//! # Limitations
//!
//! - Nothing is persisted
//! - No compaction: history is not kept, only the latest value per key

use std::{collections::BTreeMap, ops::Bound, sync::Arc, time::Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{
    StorageError,
    backend::KvBackend,
    error::StorageResult,
    health::{HealthMetadata, HealthProbe, HealthStatus},
    transaction::{Compare, Transaction, TxnOp},
    types::{KeyValue, RangeRequest, RangeResponse, SortOrder, SortTarget},
};

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    create_revision: i64,
    mod_revision: i64,
    version: i64,
}

#[derive(Debug)]
struct State {
    revision: i64,
    entries: BTreeMap<Vec<u8>, Entry>,
}

impl State {
    fn mod_revision(&self, key: &[u8]) -> Option<i64> {
        self.entries.get(key).map(|entry| entry.mod_revision)
    }

    /// Writes `key` as part of the commit at `revision`.
    fn write(&mut self, key: Vec<u8>, value: Bytes, revision: i64) {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.value = value;
                entry.mod_revision = revision;
                entry.version += 1;
            },
            None => {
                self.entries.insert(key, Entry {
                    value,
                    create_revision: revision,
                    mod_revision: revision,
                    version: 1,
                });
            },
        }
    }

    fn bounds(request: &RangeRequest) -> (Bound<&[u8]>, Bound<&[u8]>) {
        let start = Bound::Included(request.key.as_slice());
        let end = match request.range_end.as_deref() {
            None => Bound::Included(request.key.as_slice()),
            Some([0]) => Bound::Unbounded,
            Some(end) => Bound::Excluded(end),
        };
        (start, end)
    }
}

/// In-memory [`KvBackend`].
///
/// Cloning is cheap and every clone shares the same key space, so tests can
/// hand one clone to the store and keep another to inspect raw keys.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
}

impl MemoryBackend {
    /// Creates an empty backend at revision 1.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Arc::new(RwLock::new(State { revision: 1, entries: BTreeMap::new() })) }
    }

    /// Current global revision.
    #[must_use]
    pub fn revision(&self) -> i64 {
        self.state.read().revision
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns `true` if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Every stored key in lexicographic order, decoded lossily as UTF-8.
    ///
    /// Intended for assertions on the physical key layout.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state
            .read()
            .entries
            .keys()
            .map(|key| String::from_utf8_lossy(key).into_owned())
            .collect()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryBackend")
            .field("revision", &state.revision)
            .field("keys", &state.entries.len())
            .finish()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<KeyValue>> {
        let state = self.state.read();
        Ok(state.entries.get(key).map(|entry| KeyValue {
            key: Bytes::copy_from_slice(key),
            value: entry.value.clone(),
            create_revision: entry.create_revision,
            mod_revision: entry.mod_revision,
            version: entry.version,
        }))
    }

    #[tracing::instrument(skip_all, fields(limit = request.limit, count_only = request.count_only))]
    async fn range(&self, request: RangeRequest) -> StorageResult<RangeResponse> {
        let state = self.state.read();

        if let Some(end) = request.range_end.as_deref()
            && end != [0]
            && end <= request.key.as_slice()
        {
            return Ok(RangeResponse { kvs: Vec::new(), count: 0, revision: state.revision });
        }

        let mut matched: Vec<(&Vec<u8>, &Entry)> = state
            .entries
            .range::<[u8], _>(State::bounds(&request))
            .filter(|(_, entry)| request.admits_create_revision(entry.create_revision))
            .collect();

        let count = matched.len() as u64;
        if request.count_only {
            return Ok(RangeResponse { kvs: Vec::new(), count, revision: state.revision });
        }

        if request.sort_target == SortTarget::CreateRevision {
            matched.sort_by_key(|(_, entry)| entry.create_revision);
        }
        if request.sort_order == SortOrder::Descend {
            matched.reverse();
        }
        if request.limit > 0 {
            matched.truncate(request.limit);
        }

        let kvs = matched
            .into_iter()
            .map(|(key, entry)| KeyValue {
                key: Bytes::copy_from_slice(key),
                value: if request.keys_only { Bytes::new() } else { entry.value.clone() },
                create_revision: entry.create_revision,
                mod_revision: entry.mod_revision,
                version: entry.version,
            })
            .collect();

        Ok(RangeResponse { kvs, count, revision: state.revision })
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len(), value_len = value.len()))]
    async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<i64> {
        let mut state = self.state.write();
        let revision = state.revision + 1;
        state.write(key, Bytes::from(value), revision);
        state.revision = revision;
        Ok(revision)
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn delete(&self, key: &[u8]) -> StorageResult<bool> {
        let mut state = self.state.write();
        let existed = state.entries.remove(key).is_some();
        if existed {
            state.revision += 1;
        }
        Ok(existed)
    }

    #[tracing::instrument(skip_all, fields(prefix_len = prefix.len()))]
    async fn delete_prefix(&self, prefix: &[u8]) -> StorageResult<u64> {
        let request = RangeRequest::prefix(prefix);
        let mut state = self.state.write();
        let doomed: Vec<Vec<u8>> = state
            .entries
            .range::<[u8], _>(State::bounds(&request))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            state.entries.remove(key);
        }
        if !doomed.is_empty() {
            state.revision += 1;
        }
        Ok(doomed.len() as u64)
    }

    #[tracing::instrument(skip_all)]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction {
            backend: self.clone(),
            compares: Vec::new(),
            ops: Vec::new(),
        }))
    }

    #[tracing::instrument(skip_all, fields(probe = %probe))]
    async fn health_check(&self, probe: HealthProbe) -> HealthStatus {
        let started = Instant::now();
        // Taking the read lock proves no writer is stuck holding it.
        let (revision, key_count) = {
            let state = self.state.read();
            (state.revision, state.entries.len())
        };
        let metadata = HealthMetadata::new(started.elapsed(), "memory")
            .with_detail("revision", revision)
            .with_detail("key_count", key_count);
        HealthStatus::healthy(metadata)
    }
}

/// Buffered transaction over a [`MemoryBackend`].
struct MemoryTransaction {
    backend: MemoryBackend,
    compares: Vec<Compare>,
    ops: Vec<TxnOp>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn compare(&mut self, compare: Compare) {
        self.compares.push(compare);
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(TxnOp::Put { key, value });
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(TxnOp::Delete { key });
    }

    async fn commit(self: Box<Self>) -> StorageResult<i64> {
        let Self { backend, compares, ops } = *self;
        let mut state = backend.state.write();

        if let Some(failed) =
            compares.iter().find(|compare| !compare.holds(state.mod_revision(compare.key())))
        {
            tracing::debug!(
                key = %String::from_utf8_lossy(failed.key()),
                "transaction guard failed"
            );
            return Err(StorageError::conflict());
        }

        let revision = state.revision + 1;
        let mut changed = false;
        for op in ops {
            match op {
                TxnOp::Put { key, value } => {
                    state.write(key, Bytes::from(value), revision);
                    changed = true;
                },
                TxnOp::Delete { key } => {
                    changed |= state.entries.remove(&key).is_some();
                },
            }
        }
        if changed {
            state.revision = revision;
        }
        Ok(state.revision)
    }
}
