//! Resource error types.
//!
//! [`ResourceError::UnknownKind`] is matched on by callers (an unknown kind
//! is a "not found" at the HTTP boundary), so every layer above this crate
//! carries it through unchanged.

use std::sync::Arc;

use thiserror::Error;

use crate::validation::ValidationErrors;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors raised while resolving, decoding or validating resources.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ResourceError {
    /// The kind string does not name a registered resource type.
    #[error("the server doesn't have a resource type {kind}")]
    UnknownKind {
        /// The kind as the caller spelled it.
        kind: String,
    },

    /// The payload does not fit the schema of its kind.
    #[error("Schema error: {message}")]
    Schema {
        /// What did not fit.
        message: String,
        /// The parser error, when there is one.
        #[source]
        source: Option<BoxError>,
    },

    /// One or more field rules failed.
    #[error("Invalid object: {0}")]
    Invalid(ValidationErrors),
}

impl ResourceError {
    /// Creates an `UnknownKind` error.
    #[must_use]
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    /// Creates a `Schema` error without a source.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema { message: message.into(), source: None }
    }

    /// Creates a `Schema` error from a JSON parser failure.
    #[must_use]
    pub fn from_json(context: &str, source: serde_json::Error) -> Self {
        Self::Schema { message: format!("{context}: {source}"), source: Some(Arc::new(source)) }
    }

    /// Returns `true` for [`ResourceError::UnknownKind`].
    #[must_use]
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, Self::UnknownKind { .. })
    }
}

impl From<ValidationErrors> for ResourceError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Invalid(errors)
    }
}
