//! Revisioned key-value backend abstraction for the CMDB resource store.
//!
//! This crate defines the [`KvBackend`] trait the resource store is written
//! against, together with the types it speaks: [`KeyValue`] with
//! create/mod revisions and a per-key version, [`RangeRequest`] for prefix
//! scans with creation-revision bounds, and guarded multi-key
//! [`Transaction`]s.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                cmdb-store                    │
//! │   get / list / create / update / delete      │
//! │   reference edges, pagination, CAS retry     │
//! ├──────────────────────────────────────────────┤
//! │                cmdb-storage                  │
//! │       KvBackend + Transaction traits         │
//! ├──────────────────────┬───────────────────────┤
//! │    MemoryBackend     │   etcd-style cluster  │
//! │  (tests, embedding)  │  (behind the trait)   │
//! └──────────────────────┴───────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use cmdb_storage::{Compare, KvBackend, MemoryBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     let mut txn = backend.transaction().await?;
//!     txn.compare(Compare::Absent(b"/registry/projects/demo".to_vec()));
//!     txn.put(b"/registry/projects/demo".to_vec(), b"{}".to_vec());
//!     txn.commit().await?;
//!
//!     let kv = backend.get(b"/registry/projects/demo").await?.expect("written");
//!     assert_eq!(kv.version, 1);
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (key generators, a fault-injecting backend
//!   wrapper, assertion macros) for integration tests of downstream crates.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod health;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod transaction;
pub mod types;

pub use backend::KvBackend;
pub use error::{BoxError, StorageError, StorageResult};
pub use health::{HealthMetadata, HealthProbe, HealthStatus};
pub use memory::MemoryBackend;
pub use transaction::{Compare, Transaction, TxnOp};
pub use types::{KeyValue, RangeRequest, RangeResponse, SortOrder, SortTarget, prefix_end};
