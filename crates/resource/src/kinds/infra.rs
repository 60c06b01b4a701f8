//! Infrastructure kinds: credentials, organisation and physical placement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    reference::{ReferenceWalker, References},
    registry::Kind,
    validation::{Validate, Validator},
};

/// Named credential material. Every value is base64.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecretSpec {
    /// Credential entries, e.g. `privateKey`.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Validate for SecretSpec {
    fn validate(&self, v: &mut Validator) {
        if v.non_empty_map("data", &self.data) {
            for (key, value) in &self.data {
                v.base64(&format!("data.{key}"), value);
            }
        }
    }
}

impl References for SecretSpec {
    fn visit_references(&self, _walker: &mut ReferenceWalker) {}
}

/// A business project that owns apps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectSpec {
    /// Display name in the project chain.
    #[serde(default)]
    pub name_in_chain: String,
}

impl Validate for ProjectSpec {
    fn validate(&self, v: &mut Validator) {
        v.required("nameInChain", &self.name_in_chain);
    }
}

impl References for ProjectSpec {
    fn visit_references(&self, _walker: &mut ReferenceWalker) {}
}

/// A cloud or on-premise site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatacenterSpec {
    /// Infrastructure provider, e.g. `aliyun`.
    #[serde(default)]
    pub provider: String,
    /// Secret holding the site's access key.
    #[serde(default)]
    pub private_key: String,
}

impl Validate for DatacenterSpec {
    fn validate(&self, v: &mut Validator) {
        v.required("provider", &self.provider);
        v.dns_label("privateKey", &self.private_key);
    }
}

impl References for DatacenterSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("privateKey", Kind::Secret, &self.private_key);
    }
}

/// An availability zone inside a datacenter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ZoneSpec {
    /// Infrastructure provider.
    #[serde(default)]
    pub provider: String,
    /// Owning datacenter.
    #[serde(default)]
    pub datacenter: String,
}

impl Validate for ZoneSpec {
    fn validate(&self, v: &mut Validator) {
        v.required("provider", &self.provider);
        v.dns_label("datacenter", &self.datacenter);
    }
}

impl References for ZoneSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("datacenter", Kind::Datacenter, &self.datacenter);
    }
}

/// A business environment that namespaced kinds live in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NamespaceSpec {
    /// Environment tag, e.g. `prod`.
    #[serde(default)]
    pub biz_env: String,
    /// Owning business line.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub biz_name: String,
}

impl Validate for NamespaceSpec {
    fn validate(&self, v: &mut Validator) {
        v.required("bizEnv", &self.biz_env);
    }
}

impl References for NamespaceSpec {
    fn visit_references(&self, _walker: &mut ReferenceWalker) {}
}

/// A source-control service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScmSpec {
    /// Datacenter hosting the service.
    #[serde(default)]
    pub datacenter: String,
    /// Base URL.
    #[serde(default)]
    pub url: String,
    /// Service flavour, e.g. `gitlab`.
    #[serde(default)]
    pub service: String,
}

impl Validate for ScmSpec {
    fn validate(&self, v: &mut Validator) {
        v.dns_label("datacenter", &self.datacenter);
        v.url("url", &self.url);
        v.required("service", &self.service);
    }
}

impl References for ScmSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("datacenter", Kind::Datacenter, &self.datacenter);
    }
}

/// A machine that apps can be placed on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HostNodeSpec {
    /// Provider instance id.
    #[serde(default)]
    pub id: String,
    /// Management address.
    #[serde(default)]
    pub ip: String,
    /// SSH port; `0` means the default.
    #[serde(default, skip_serializing_if = "is_default_port")]
    pub port: u16,
    /// Login user.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Zone the node sits in.
    #[serde(default)]
    pub zone: String,
    /// Secret with the login key.
    #[serde(default)]
    pub private_key: String,
}

fn is_default_port(port: &u16) -> bool {
    *port == 0
}

impl Validate for HostNodeSpec {
    fn validate(&self, v: &mut Validator) {
        v.required("id", &self.id);
        v.ip("ip", &self.ip);
        v.dns_label("zone", &self.zone);
        v.dns_label("privateKey", &self.private_key);
    }
}

impl References for HostNodeSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("zone", Kind::Zone, &self.zone);
        walker.reference("privateKey", Kind::Secret, &self.private_key);
    }
}
