//! Object metadata and the generic resource envelope.
//!
//! Every stored document has the same outer shape:
//!
//! ```json
//! {
//!   "apiVersion": "v1alpha",
//!   "kind": "Datacenter",
//!   "metadata": { "name": "dc1", "labels": { "env": "prod" } },
//!   "description": "primary region",
//!   "spec": { "provider": "aliyun", "privateKey": "dc1-key" }
//! }
//! ```
//!
//! Only `spec` differs between kinds. The revision counters in `metadata`
//! are never part of the stored payload; the store attaches them from the
//! backend's per-key counters on every read.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API version stamped on documents that do not carry one.
pub const API_VERSION: &str = "v1alpha";

/// Default value of [`ManagedFields::manager`].
pub const DEFAULT_MANAGER: &str = "cmctl";

/// Default value of [`ManagedFields::operation`].
pub const DEFAULT_OPERATION: &str = "Updated";

fn default_api_version() -> String {
    API_VERSION.to_owned()
}

fn default_manager() -> String {
    DEFAULT_MANAGER.to_owned()
}

fn default_operation() -> String {
    DEFAULT_OPERATION.to_owned()
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Who last wrote the object, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManagedFields {
    /// Client that performed the last write.
    #[serde(default = "default_manager")]
    pub manager: String,
    /// Kind of the last write.
    #[serde(default = "default_operation")]
    pub operation: String,
    /// Time of the last write. Store-managed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl Default for ManagedFields {
    fn default() -> Self {
        Self { manager: default_manager(), operation: default_operation(), time: None }
    }
}

/// Identity, bookkeeping and selection data shared by every kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ObjectMeta {
    /// Name, unique within the kind (and namespace, for namespaced kinds).
    #[serde(default)]
    pub name: String,

    /// Namespace; set only for namespaced kinds.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Backend revision that created the object. Store-managed.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub create_revision: i64,

    /// Backend revision of the last write. Store-managed.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub revision: i64,

    /// Number of writes since creation. Store-managed.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub version: i64,

    /// Creation time. Store-managed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Last writer.
    #[serde(default)]
    pub managed_fields: ManagedFields,

    /// Selection labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Free-form annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Metadata with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Names of the store-managed fields that carry a value.
    #[must_use]
    pub fn system_fields_set(&self) -> Vec<&'static str> {
        let mut set = Vec::new();
        if self.create_revision != 0 {
            set.push("metadata.createRevision");
        }
        if self.revision != 0 {
            set.push("metadata.revision");
        }
        if self.version != 0 {
            set.push("metadata.version");
        }
        if self.creation_timestamp.is_some() {
            set.push("metadata.creationTimestamp");
        }
        if self.managed_fields.time.is_some() {
            set.push("metadata.managedFields.time");
        }
        set
    }

    /// Overwrites every store-managed field with the values from `stored`.
    pub fn adopt_system_fields(&mut self, stored: &ObjectMeta) {
        self.create_revision = stored.create_revision;
        self.revision = stored.revision;
        self.version = stored.version;
        self.creation_timestamp = stored.creation_timestamp;
        self.managed_fields.time = stored.managed_fields.time;
    }

    /// Attaches the backend's per-key counters.
    pub fn set_counters(&mut self, create_revision: i64, revision: i64, version: i64) {
        self.create_revision = create_revision;
        self.revision = revision;
        self.version = version;
    }

    /// Zeroes the backend counters, which are not part of the stored payload.
    pub fn clear_counters(&mut self) {
        self.set_counters(0, 0, 0);
    }

    /// Returns `true` if every `selector` pair is present in the labels.
    #[must_use]
    pub fn matches_labels(&self, selector: &BTreeMap<String, String>) -> bool {
        selector.iter().all(|(key, value)| self.labels.get(key) == Some(value))
    }
}

/// The envelope around a kind-specific `spec`.
///
/// Concrete kinds are aliases such as `Datacenter = Resource<DatacenterSpec>`;
/// see [`registry`](crate::registry) for the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Resource<S> {
    /// Document schema version.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Kind discriminator.
    #[serde(default)]
    pub kind: String,
    /// Identity and bookkeeping.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Kind-specific payload.
    #[serde(default)]
    pub spec: S,
}
