//! Store error types.
//!
//! Each failure mode is a separate [`StoreError`] variant so boundary
//! layers can branch on the kind instead of matching on messages.
//! [`StoreError::status_code`] gives the HTTP status a router should reply
//! with.
//!
//! ```
//! use cmdb_store::StoreError;
//!
//! let err = StoreError::key_not_found("/registry/secrets/db");
//! assert!(err.is_not_found());
//! assert_eq!(err.status_code(), 404);
//! ```

use std::{sync::Arc, time::Duration};

use cmdb_resource::{Reference, ResourceError, ValidationErrors};
use cmdb_storage::StorageError;
use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

fn join_references(references: &[Reference]) -> String {
    references.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Errors returned by [`Store`](crate::Store) operations.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The kind string does not name a registered resource type.
    #[error("the server doesn't have a resource type {kind}")]
    UnknownKind {
        /// The kind as the caller spelled it.
        kind: String,
    },

    /// A document could not be decoded or encoded.
    #[error("Schema error: {message}")]
    Schema {
        /// What did not fit.
        message: String,
        /// The codec error.
        #[source]
        source: Option<BoxError>,
    },

    /// Field validation failed.
    #[error("invalid object {key}: {errors}")]
    InvalidObject {
        /// Primary key of the object.
        key: String,
        /// Every failing field.
        errors: ValidationErrors,
    },

    /// A create carried values for store-managed fields.
    #[error("store-managed fields must not be set on create {key}: {}", .fields.join(", "))]
    SystemFieldsSet {
        /// Primary key of the object.
        key: String,
        /// Paths of the offending fields.
        fields: Vec<&'static str>,
    },

    /// No object at the key.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// Primary key that was looked up.
        key: String,
    },

    /// An object already exists at the key.
    #[error("key exists: {key}")]
    KeyExists {
        /// Primary key that was taken.
        key: String,
    },

    /// Reference fields name objects that do not exist.
    #[error("reference targets of {key} do not exist: {}", join_references(.missing))]
    ReferencedNotExist {
        /// Primary key of the referrer.
        key: String,
        /// The unresolved references.
        missing: Vec<Reference>,
    },

    /// Delete refused because another object references this one.
    #[error("resource {key} is referenced by {referrer_kind} {referrer_name}")]
    ResourceReferenced {
        /// Primary key of the referenced object.
        key: String,
        /// Kind of one referrer.
        referrer_kind: String,
        /// Name of that referrer.
        referrer_name: String,
    },

    /// A guarded write lost a race. Retried internally by update and delete.
    #[error("concurrent modification of {key}")]
    Conflict {
        /// Primary key being written.
        key: String,
    },

    /// Every attempt of the retry loop hit a conflict.
    #[error("gave up on {key} after {attempts} conflicting attempts")]
    CasRetriesExhausted {
        /// Primary key being written.
        key: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The operation did not finish in time.
    #[error("operation timed out{}", .after.map(|d| format!(" after {d:?}")).unwrap_or_default())]
    Timeout {
        /// Configured limit, when the store's own deadline fired.
        after: Option<Duration>,
    },

    /// Backend failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
        /// The backend error.
        #[source]
        source: Option<BoxError>,
        /// Whether repeating the call may succeed.
        transient: bool,
    },
}

impl StoreError {
    /// Creates a `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a `KeyExists` error.
    #[must_use]
    pub fn key_exists(key: impl Into<String>) -> Self {
        Self::KeyExists { key: key.into() }
    }

    /// Creates a `Conflict` error.
    #[must_use]
    pub fn conflict(key: impl Into<String>) -> Self {
        Self::Conflict { key: key.into() }
    }

    /// Creates an `Internal` error without a source.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None, transient: false }
    }

    /// Returns `true` for [`StoreError::KeyNotFound`] and [`StoreError::UnknownKind`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. } | Self::UnknownKind { .. })
    }

    /// Returns `true` for [`StoreError::KeyExists`].
    #[must_use]
    pub fn is_exists(&self) -> bool {
        matches!(self, Self::KeyExists { .. })
    }

    /// Returns `true` for [`StoreError::InvalidObject`] and [`StoreError::SystemFieldsSet`].
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::InvalidObject { .. } | Self::SystemFieldsSet { .. })
    }

    /// Returns `true` for [`StoreError::ReferencedNotExist`].
    #[must_use]
    pub fn is_referenced_not_exist(&self) -> bool {
        matches!(self, Self::ReferencedNotExist { .. })
    }

    /// Returns `true` for [`StoreError::ResourceReferenced`].
    #[must_use]
    pub fn is_resource_referenced(&self) -> bool {
        matches!(self, Self::ResourceReferenced { .. })
    }

    /// Returns `true` for [`StoreError::Internal`].
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns `true` if repeating the whole call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Conflict { .. } | Self::CasRetriesExhausted { .. } | Self::Timeout { .. } => true,
            Self::Internal { transient, .. } => *transient,
            _ => false,
        }
    }

    /// HTTP status a boundary layer should answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownKind { .. } | Self::KeyNotFound { .. } => 404,
            Self::InvalidObject { .. } | Self::SystemFieldsSet { .. } | Self::Schema { .. } => 422,
            Self::KeyExists { .. }
            | Self::ReferencedNotExist { .. }
            | Self::ResourceReferenced { .. } => 400,
            Self::Conflict { .. } | Self::CasRetriesExhausted { .. } => 409,
            Self::Timeout { .. } => 504,
            Self::Internal { .. } => 500,
        }
    }
}

impl From<ResourceError> for StoreError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::UnknownKind { kind } => Self::UnknownKind { kind },
            ResourceError::Schema { message, source } => Self::Schema { message, source },
            ResourceError::Invalid(errors) => Self::InvalidObject { key: String::new(), errors },
            other => Self::Schema { message: other.to_string(), source: None },
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::Conflict { key: String::new() },
            StorageError::Timeout => Self::Timeout { after: None },
            other => {
                let transient = other.is_transient();
                Self::Internal {
                    message: other.to_string(),
                    source: Some(Arc::new(other)),
                    transient,
                }
            },
        }
    }
}

/// Invalid [`StoreConfig`](crate::StoreConfig) or
/// [`CasRetryConfig`](crate::CasRetryConfig) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ConfigError {
    /// Offending field.
    pub field: &'static str,
    /// Why it was rejected.
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::error::Error as _;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(StoreError::UnknownKind { kind: "Widget".into() }, 404)]
    #[case(StoreError::key_not_found("k"), 404)]
    #[case(StoreError::InvalidObject { key: "k".into(), errors: ValidationErrors::default() }, 422)]
    #[case(StoreError::SystemFieldsSet { key: "k".into(), fields: vec!["metadata.version"] }, 422)]
    #[case(StoreError::key_exists("k"), 400)]
    #[case(StoreError::ReferencedNotExist { key: "k".into(), missing: vec![] }, 400)]
    #[case(StoreError::ResourceReferenced {
        key: "k".into(),
        referrer_kind: "Zone".into(),
        referrer_name: "z".into(),
    }, 400)]
    #[case(StoreError::CasRetriesExhausted { key: "k".into(), attempts: 3 }, 409)]
    #[case(StoreError::Timeout { after: None }, 504)]
    #[case(StoreError::internal("boom"), 500)]
    fn status_codes(#[case] err: StoreError, #[case] status: u16) {
        assert_eq!(err.status_code(), status);
    }

    #[test]
    fn unknown_kind_survives_conversion() {
        let err: StoreError = ResourceError::unknown_kind("Widget").into();
        assert!(matches!(&err, StoreError::UnknownKind { kind } if kind == "Widget"));
        assert_eq!(err.to_string(), "the server doesn't have a resource type Widget");
    }

    #[test]
    fn storage_errors_keep_their_source() {
        let err: StoreError = StorageError::connection("refused").into();
        assert!(err.is_internal());
        assert!(err.is_transient());
        assert_eq!(err.source().unwrap().to_string(), "Connection error: refused");

        let err: StoreError = StorageError::internal("corrupt").into();
        assert!(!err.is_transient());
    }

    #[test]
    fn storage_conflict_and_timeout_map_to_their_own_variants() {
        assert!(matches!(StoreError::from(StorageError::conflict()), StoreError::Conflict { .. }));
        assert!(matches!(
            StoreError::from(StorageError::timeout()),
            StoreError::Timeout { after: None }
        ));
    }

    #[test]
    fn timeout_message_names_the_limit() {
        let err = StoreError::Timeout { after: Some(Duration::from_millis(250)) };
        assert_eq!(err.to_string(), "operation timed out after 250ms");
        assert_eq!(StoreError::Timeout { after: None }.to_string(), "operation timed out");
    }

    #[test]
    fn referenced_not_exist_lists_targets() {
        let err = StoreError::ReferencedNotExist {
            key: "/registry/zones/z1".into(),
            missing: vec![Reference {
                target_kind: cmdb_resource::Kind::Datacenter,
                target_name: "dc9".into(),
                field_path: "spec.datacenter".into(),
            }],
        };
        assert_eq!(
            err.to_string(),
            "reference targets of /registry/zones/z1 do not exist: Datacenter/dc9 (at spec.datacenter)"
        );
    }
}
