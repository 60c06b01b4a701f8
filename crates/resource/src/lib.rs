//! Resource model for the CMDB.
//!
//! Every resource is a `Resource<Spec>` envelope (`apiVersion`, `kind`,
//! `metadata`, `description`, `spec`) around a kind-specific payload. The
//! registry closes the set of kinds into [`Object`], which the store and
//! the boundary layers handle without per-kind code:
//!
//! - [`resolve`] maps a kind name, ignoring case, to an empty object and its scope.
//! - [`find_references`] lists the cross-resource references an object holds.
//! - [`codec::decode`] / [`codec::encode`] convert any kind to and from JSON, rejecting
//!   undeclared fields.
//! - [`Object::validate`] checks identity and per-kind field rules.
//!
//! ```
//! use cmdb_resource::{Kind, codec};
//!
//! let object = codec::decode(br#"{
//!     "kind": "secret",
//!     "metadata": { "name": "db-password" },
//!     "spec": { "data": { "password": "aHVudGVyMg==" } }
//! }"#)?;
//! assert_eq!(object.kind(), Kind::Secret);
//! object.validate()?;
//! # Ok::<(), cmdb_resource::ResourceError>(())
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with one valid, mutually consistent fixture
//!   per kind.

#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod kinds;
pub mod meta;
pub mod reference;
pub mod registry;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod validation;

pub use error::{BoxError, ResourceError, ResourceResult};
pub use kinds::*;
pub use meta::{API_VERSION, ManagedFields, ObjectMeta, Resource};
pub use reference::{Reference, ReferenceWalker, References, find_references};
pub use registry::{
    App, AppDeployment, AppInstance, ConfigCenter, ContainerRegistry, Datacenter, DeployPlatform,
    DeployTemplate, HelmRepository, HostNode, Kind, Namespace, Object, Orchestration, Project,
    ResourceRange, Scm, Secret, Spec, Zone, resolve, sort_for_apply, sort_for_delete,
};
pub use validation::{FieldError, Validate, ValidationErrors, Validator};
