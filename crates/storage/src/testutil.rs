//! Shared test utilities for backend testing.
//!
//! Feature-gated behind `testutil` so none of this reaches production builds.
//!
//! ```toml
//! [dev-dependencies]
//! cmdb-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use cmdb_storage::testutil::{FaultyBackend, make_key, populated_backend};
//! ```

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{Subscriber, span, subscriber::DefaultGuard};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
};

use crate::{
    KvBackend,
    error::{StorageError, StorageResult},
    health::{HealthMetadata, HealthProbe, HealthStatus},
    memory::MemoryBackend,
    transaction::{Compare, Transaction},
    types::{KeyValue, RangeRequest, RangeResponse},
};

/// Creates a deterministic key such as `"prefix/000042"`.
///
/// Zero padding keeps lexicographic order equal to numeric order.
#[must_use]
pub fn make_key(prefix: &str, idx: usize) -> Vec<u8> {
    format!("{prefix}/{idx:06}").into_bytes()
}

/// Creates a value tagged with a task and sequence number, e.g. `"task3-val42"`.
#[must_use]
pub fn make_tagged_value(task: usize, seq: usize) -> Vec<u8> {
    format!("task{task}-val{seq}").into_bytes()
}

/// Creates a [`MemoryBackend`] holding `count` keys under `prefix`, written
/// one per revision in index order.
///
/// # Panics
///
/// Panics if a write fails, which `MemoryBackend` never does.
pub async fn populated_backend(prefix: &str, count: usize) -> MemoryBackend {
    let backend = MemoryBackend::new();
    for i in 0..count {
        backend.put(make_key(prefix, i), make_tagged_value(0, i)).await.expect("populate put");
    }
    backend
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use cmdb_storage::{assert_conflict, StorageError, StorageResult};
///
/// let result: StorageResult<i64> = Err(StorageError::Conflict);
/// assert_conflict!(result);
/// ```
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "{}: expected StorageError::Conflict, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Unwraps a [`StorageResult`], panicking with the error on failure.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
}

/// A [`MemoryBackend`] wrapper that fails transaction commits on demand.
///
/// Queued faults are consumed one per commit; a commit that consumes a fault
/// returns it without applying anything. Reads and unconditional writes pass
/// straight through.
#[derive(Clone, Debug, Default)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    faults: Arc<Mutex<VecDeque<StorageError>>>,
    unhealthy: Arc<Mutex<Option<String>>>,
}

impl FaultyBackend {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: MemoryBackend) -> Self {
        Self { inner, ..Self::default() }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    /// Queues `count` copies of `error` for the next commits.
    pub fn fail_commits(&self, count: usize, error: StorageError) {
        let mut faults = self.faults.lock();
        faults.extend(std::iter::repeat_n(error, count));
    }

    /// Number of queued faults not yet consumed.
    #[must_use]
    pub fn pending_faults(&self) -> usize {
        self.faults.lock().len()
    }

    /// Makes readiness probes report unhealthy with `reason`.
    pub fn set_unhealthy(&self, reason: impl Into<String>) {
        *self.unhealthy.lock() = Some(reason.into());
    }
}

#[async_trait]
impl KvBackend for FaultyBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<KeyValue>> {
        self.inner.get(key).await
    }

    async fn range(&self, request: RangeRequest) -> StorageResult<RangeResponse> {
        self.inner.range(request).await
    }

    async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<i64> {
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<bool> {
        self.inner.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &[u8]) -> StorageResult<u64> {
        self.inner.delete_prefix(prefix).await
    }

    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        let inner = self.inner.transaction().await?;
        Ok(Box::new(FaultyTransaction { inner, faults: Arc::clone(&self.faults) }))
    }

    async fn health_check(&self, probe: HealthProbe) -> HealthStatus {
        let reason = self.unhealthy.lock().clone();
        match reason {
            Some(reason) if probe == HealthProbe::Readiness => HealthStatus::unhealthy(
                HealthMetadata::new(std::time::Duration::ZERO, "faulty"),
                reason,
            ),
            _ => self.inner.health_check(probe).await,
        }
    }
}

struct FaultyTransaction {
    inner: Box<dyn Transaction>,
    faults: Arc<Mutex<VecDeque<StorageError>>>,
}

#[async_trait]
impl Transaction for FaultyTransaction {
    fn compare(&mut self, compare: Compare) {
        self.inner.compare(compare);
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.inner.put(key, value);
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.inner.delete(key);
    }

    async fn commit(self: Box<Self>) -> StorageResult<i64> {
        let Self { inner, faults } = *self;
        let fault = faults.lock().pop_front();
        match fault {
            Some(error) => Err(error),
            None => inner.commit().await,
        }
    }
}

// ============================================================================
// Span recording
// ============================================================================

/// A tracing layer that records the name of every span as it is created.
///
/// Clones share one record, so a test keeps a handle while the installed
/// copy observes.
#[derive(Clone, Debug, Default)]
pub struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl SpanCollector {
    /// Installs a registry carrying this layer as the thread's default
    /// subscriber until the guard drops.
    #[must_use = "the collector is uninstalled when the guard drops"]
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    /// Span names in creation order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.spans.lock().clone()
    }

    /// Returns `true` if a span called `name` was created.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.spans.lock().iter().any(|s| s == name)
    }
}

impl<S> Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().push(span.name().to_owned());
        }
    }
}
