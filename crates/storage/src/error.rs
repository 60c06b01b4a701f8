//! Storage error types and result alias.
//!
//! Every [`KvBackend`](crate::KvBackend) maps its internal failures onto
//! [`StorageError`]. The resource store above this crate only needs to tell
//! three situations apart: a failed transaction guard ([`StorageError::Conflict`]),
//! a transport problem that may go away on its own, and everything else.
//!
//! # Example
//!
//! ```
//! use cmdb_storage::{StorageError, StorageResult};
//!
//! fn unreachable_backend() -> StorageResult<()> {
//!     Err(StorageError::connection("connection refused"))
//! }
//!
//! assert!(unreachable_backend().unwrap_err().is_transient());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// This enum is `#[non_exhaustive]`; downstream matches need a wildcard arm.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// At least one compare guard of a transaction did not hold at commit
    /// time. Nothing from the transaction was applied.
    #[error("Transaction conflict")]
    Conflict,

    /// The backend could not be reached.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Backend-specific failure that fits no other category.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The operation exceeded its time limit.
    #[error("Operation timeout")]
    Timeout,
}

impl StorageError {
    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict() -> Self {
        Self::Conflict
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` for failures that may succeed when simply repeated
    /// (transport errors and timeouts).
    ///
    /// Conflicts are deliberately not transient: repeating the same
    /// transaction fails the same way until the caller re-reads.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StorageError::connection("down").is_transient());
        assert!(StorageError::timeout().is_transient());
        assert!(!StorageError::conflict().is_transient());
        assert!(!StorageError::internal("boom").is_transient());
    }

    #[test]
    fn source_chain_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = StorageError::connection_with_source("dial failed", io);

        assert_eq!(err.to_string(), "Connection error: dial failed");
        let source = err.source().expect("source should be attached");
        assert_eq!(source.to_string(), "refused");
    }
}
