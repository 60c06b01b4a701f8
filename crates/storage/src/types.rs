//! Common types used across storage operations.
//!
//! The shapes mirror an etcd-style revisioned key space: every stored key
//! carries the revision that created it, the revision that last modified it
//! and a per-key write counter. Range requests can be bounded by creation
//! revision, which is what makes offset-free pagination possible.

use bytes::Bytes;

/// A stored key with its revision metadata.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use cmdb_storage::KeyValue;
///
/// let kv = KeyValue::new(Bytes::from("/registry/secrets/db"), Bytes::from("{}"));
/// assert_eq!(kv.version, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key identifying this entry.
    pub key: Bytes,

    /// The value stored at this key. Empty for keys-only range responses.
    pub value: Bytes,

    /// Global revision of the transaction that created the key.
    pub create_revision: i64,

    /// Global revision of the last transaction that wrote the key.
    pub mod_revision: i64,

    /// Number of writes to the key since it was created, starting at 1.
    pub version: i64,
}

impl KeyValue {
    /// Creates a key-value pair with zeroed revision metadata.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value, create_revision: 0, mod_revision: 0, version: 0 }
    }
}

/// Field used to order range results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortTarget {
    /// Lexicographic key order.
    #[default]
    Key,
    /// Order of creation.
    CreateRevision,
}

/// Direction of a range sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascend,
    /// Largest first.
    Descend,
}

/// A read over one key or a key range.
///
/// Build with [`RangeRequest::key`] or [`RangeRequest::prefix`] and refine
/// with the chained setters.
///
/// # Examples
///
/// ```
/// use cmdb_storage::{RangeRequest, SortOrder, SortTarget};
///
/// let request = RangeRequest::prefix("/registry/secrets/")
///     .keys_only()
///     .sort_by(SortTarget::CreateRevision, SortOrder::Ascend)
///     .limit(20);
/// assert_eq!(request.limit, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    /// First key of the range (inclusive).
    pub key: Vec<u8>,
    /// End of the range (exclusive). `None` reads exactly `key`.
    pub range_end: Option<Vec<u8>>,
    /// Maximum number of keys returned. `0` means unlimited.
    pub limit: usize,
    /// Result ordering.
    pub sort_target: SortTarget,
    /// Result direction.
    pub sort_order: SortOrder,
    /// Omit values from the response.
    pub keys_only: bool,
    /// Return only the count, no key-values.
    pub count_only: bool,
    /// Only keys created at or after this revision (0 disables the bound).
    pub min_create_revision: i64,
    /// Only keys created at or before this revision (0 disables the bound).
    pub max_create_revision: i64,
}

impl RangeRequest {
    /// Reads a single key.
    #[must_use]
    pub fn key(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            range_end: None,
            limit: 0,
            sort_target: SortTarget::Key,
            sort_order: SortOrder::Ascend,
            keys_only: false,
            count_only: false,
            min_create_revision: 0,
            max_create_revision: 0,
        }
    }

    /// Reads every key that starts with `prefix`.
    #[must_use]
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        let key = prefix.into();
        let range_end = prefix_end(&key);
        Self { range_end: Some(range_end), ..Self::key(key) }
    }

    /// Caps the number of returned keys.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Orders the results.
    #[must_use]
    pub fn sort_by(mut self, target: SortTarget, order: SortOrder) -> Self {
        self.sort_target = target;
        self.sort_order = order;
        self
    }

    /// Drops values from the response.
    #[must_use]
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    /// Returns the count only.
    #[must_use]
    pub fn count_only(mut self) -> Self {
        self.count_only = true;
        self
    }

    /// Lower creation-revision bound (inclusive).
    #[must_use]
    pub fn min_create_revision(mut self, revision: i64) -> Self {
        self.min_create_revision = revision;
        self
    }

    /// Upper creation-revision bound (inclusive).
    #[must_use]
    pub fn max_create_revision(mut self, revision: i64) -> Self {
        self.max_create_revision = revision;
        self
    }

    /// Whether `create_revision` satisfies both creation bounds.
    #[must_use]
    pub fn admits_create_revision(&self, create_revision: i64) -> bool {
        (self.min_create_revision == 0 || create_revision >= self.min_create_revision)
            && (self.max_create_revision == 0 || create_revision <= self.max_create_revision)
    }
}

/// Result of a [`RangeRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeResponse {
    /// Matching key-values after sort and limit.
    pub kvs: Vec<KeyValue>,
    /// Number of keys matching the range and creation bounds, ignoring `limit`.
    pub count: u64,
    /// Store revision the response was served at.
    pub revision: i64,
}

/// Returns the smallest key that is greater than every key starting with
/// `prefix`.
///
/// Trailing `0xff` bytes are dropped before incrementing. A prefix made only
/// of `0xff` bytes (or an empty prefix) has no upper bound and yields
/// `[0x00]`, which backends treat as "to the end of the key space".
///
/// ```
/// use cmdb_storage::prefix_end;
///
/// assert_eq!(prefix_end(b"/registry/"), b"/registry0".to_vec());
/// assert_eq!(prefix_end(b"a\xff"), b"b".to_vec());
/// ```
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    vec![0]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn prefix_request_sets_range_end() {
        let request = RangeRequest::prefix("/registry/apps/");
        assert_eq!(request.key, b"/registry/apps/".to_vec());
        assert_eq!(request.range_end, Some(b"/registry/apps0".to_vec()));
    }

    #[test]
    fn unbounded_prefix_end() {
        assert_eq!(prefix_end(b""), vec![0]);
        assert_eq!(prefix_end(&[0xff, 0xff]), vec![0]);
    }

    #[test]
    fn create_revision_bounds() {
        let request = RangeRequest::prefix("p").min_create_revision(3).max_create_revision(5);
        assert!(!request.admits_create_revision(2));
        assert!(request.admits_create_revision(3));
        assert!(request.admits_create_revision(5));
        assert!(!request.admits_create_revision(6));
        assert!(RangeRequest::prefix("p").admits_create_revision(1));
    }

    proptest! {
        /// Every extension of a prefix sorts strictly below its range end.
        #[test]
        fn extensions_sort_below_prefix_end(
            prefix in proptest::collection::vec(0u8..0xff, 1..12),
            suffix in proptest::collection::vec(any::<u8>(), 0..12),
        ) {
            let end = prefix_end(&prefix);
            let mut key = prefix.clone();
            key.extend_from_slice(&suffix);
            prop_assert!(key < end);
            prop_assert!(prefix < end);
        }
    }
}
