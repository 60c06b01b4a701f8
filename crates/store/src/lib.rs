//! Generic resource store for the CMDB.
//!
//! [`Store`] persists every resource kind registered in `cmdb-resource` on
//! top of any [`KvBackend`](cmdb_storage::KvBackend), keeping a reference
//! graph alongside the records:
//!
//! - an object cannot be created or updated while a resource it names is missing
//! - an object cannot be deleted while another object names it
//! - concurrent writers are serialized by revision guards and a bounded retry loop
//!
//! ```
//! use cmdb_resource::{Object, Secret, SecretSpec};
//! use cmdb_storage::MemoryBackend;
//! use cmdb_store::{GetOptions, Store, StoreConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::new(MemoryBackend::new(), StoreConfig::default());
//!
//! let spec = SecretSpec { data: [("token".to_owned(), "czNjcjN0".to_owned())].into() };
//! let created = store.create(Object::Secret(Secret::new("ci", spec))).await?;
//! assert_eq!(created.meta().version, 1);
//!
//! let read = store.get("secret", "ci", "", &GetOptions::default()).await?;
//! assert_eq!(read, Some(created));
//!
//! store.delete("Secret", "ci", "").await?;
//! assert_eq!(store.count("Secret", "").await?, 0);
//! # Ok(())
//! # }
//! ```
//!
//! Keys live under a configurable prefix (`/registry` by default); see
//! [`StoreConfig`].

#![deny(unsafe_code)]

pub mod config;
pub mod error;
mod keys;
pub mod options;
mod retry;
pub mod store;

pub use config::{
    CasRetryConfig, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, DEFAULT_OPERATION_TIMEOUT,
    DEFAULT_PATH_PREFIX, MAX_BASE_DELAY, StoreConfig,
};
pub use error::{BoxError, ConfigError, StoreError, StoreResult};
pub use options::{GetOptions, ListOptions, SelectorError, encode_selector, parse_selector};
pub use store::Store;
