//! Guarded multi-key transactions.
//!
//! A [`Transaction`] collects compare guards and write operations and
//! applies them in one atomic step on [`commit`](Transaction::commit). This is
//! the only coordination primitive the resource store relies on: every
//! mutation of the key space goes through a guarded transaction.
//!
//! # Example
//!
//! ```
//! use cmdb_storage::{Compare, KvBackend, MemoryBackend, StorageError};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//!
//! // Insert-if-absent
//! let mut txn = backend.transaction().await.unwrap();
//! txn.compare(Compare::Absent(b"/registry/secrets/db".to_vec()));
//! txn.put(b"/registry/secrets/db".to_vec(), b"{}".to_vec());
//! txn.commit().await.unwrap();
//!
//! // The same guard now fails and nothing is written
//! let mut txn = backend.transaction().await.unwrap();
//! txn.compare(Compare::Absent(b"/registry/secrets/db".to_vec()));
//! txn.put(b"/registry/secrets/db".to_vec(), b"{\"x\":1}".to_vec());
//! assert!(matches!(txn.commit().await, Err(StorageError::Conflict)));
//! # });
//! ```

use async_trait::async_trait;

use crate::error::StorageResult;

/// A guard evaluated against the committed state at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compare {
    /// The key currently exists.
    Exists(Vec<u8>),
    /// The key currently does not exist.
    Absent(Vec<u8>),
    /// The key's `mod_revision` equals the given revision. A revision of `0`
    /// is equivalent to [`Compare::Absent`].
    ModRevision(Vec<u8>, i64),
}

impl Compare {
    /// The key this guard inspects.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Exists(key) | Self::Absent(key) | Self::ModRevision(key, _) => key,
        }
    }

    /// Evaluates the guard given the key's current `mod_revision`
    /// (`None` when the key is absent).
    #[must_use]
    pub fn holds(&self, current_mod_revision: Option<i64>) -> bool {
        match (self, current_mod_revision) {
            (Self::Exists(_), current) => current.is_some(),
            (Self::Absent(_), current) => current.is_none(),
            (Self::ModRevision(_, 0), current) => current.is_none(),
            (Self::ModRevision(_, expected), Some(current)) => *expected == current,
            (Self::ModRevision(_, _), None) => false,
        }
    }
}

/// A buffered write inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    /// Write `value` at `key`.
    Put {
        /// Target key.
        key: Vec<u8>,
        /// New value.
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete {
        /// Target key.
        key: Vec<u8>,
    },
}

/// Transaction handle for guarded, atomic multi-key commits.
///
/// Guards and operations are buffered until [`commit`](Transaction::commit).
/// Operations are applied in the order they were added, so a delete followed
/// by a put of the same key leaves the key present.
#[async_trait]
pub trait Transaction: Send {
    /// Adds a guard. All guards must hold for the commit to apply.
    fn compare(&mut self, compare: Compare);

    /// Buffers a write.
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Buffers a delete.
    fn delete(&mut self, key: Vec<u8>);

    /// Evaluates every guard and, if all hold, applies every buffered
    /// operation atomically.
    ///
    /// Returns the store revision after the commit. A transaction without
    /// effective writes leaves the revision unchanged.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) if any guard failed; nothing was
    ///   applied.
    /// - Other [`StorageError`](crate::StorageError) variants on backend failures.
    async fn commit(self: Box<Self>) -> StorageResult<i64>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::exists_present(Compare::Exists(b"k".to_vec()), Some(4), true)]
    #[case::exists_absent(Compare::Exists(b"k".to_vec()), None, false)]
    #[case::absent_present(Compare::Absent(b"k".to_vec()), Some(4), false)]
    #[case::absent_absent(Compare::Absent(b"k".to_vec()), None, true)]
    #[case::revision_match(Compare::ModRevision(b"k".to_vec(), 4), Some(4), true)]
    #[case::revision_stale(Compare::ModRevision(b"k".to_vec(), 3), Some(4), false)]
    #[case::revision_missing(Compare::ModRevision(b"k".to_vec(), 3), None, false)]
    #[case::revision_zero_absent(Compare::ModRevision(b"k".to_vec(), 0), None, true)]
    #[case::revision_zero_present(Compare::ModRevision(b"k".to_vec(), 0), Some(1), false)]
    fn compare_evaluation(
        #[case] compare: Compare,
        #[case] current: Option<i64>,
        #[case] expected: bool,
    ) {
        assert_eq!(compare.holds(current), expected);
        assert_eq!(compare.key(), b"k");
    }
}
