//! Delivery tooling: artifact stores, configuration services and the
//! platforms apps are deployed onto.

use serde::{Deserialize, Serialize};

use crate::{
    reference::{ReferenceWalker, References},
    registry::Kind,
    validation::{Validate, Validator},
};

/// A Helm chart repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HelmRepositorySpec {
    /// Repository URL.
    #[serde(default)]
    pub url: String,
    /// Base64 `user:password`, when the repository is private.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth: String,
}

impl Validate for HelmRepositorySpec {
    fn validate(&self, v: &mut Validator) {
        v.url("url", &self.url);
        v.optional_base64("auth", &self.auth);
    }
}

impl References for HelmRepositorySpec {
    fn visit_references(&self, _walker: &mut ReferenceWalker) {}
}

/// Login for a container registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryAuth {
    /// Login user.
    #[serde(default)]
    pub user: String,
    /// Base64 password.
    #[serde(default)]
    pub password: String,
}

impl Validate for RegistryAuth {
    fn validate(&self, v: &mut Validator) {
        v.required("user", &self.user);
        v.base64("password", &self.password);
    }
}

/// An OCI image registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerRegistrySpec {
    /// Registry URL.
    #[serde(default)]
    pub url: String,
    /// Push/pull credentials.
    #[serde(default)]
    pub auth: RegistryAuth,
}

impl Validate for ContainerRegistrySpec {
    fn validate(&self, v: &mut Validator) {
        v.url("url", &self.url);
        v.nested("auth", &self.auth);
    }
}

impl References for ContainerRegistrySpec {
    fn visit_references(&self, _walker: &mut ReferenceWalker) {}
}

/// Connection settings for an Apollo configuration service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApolloConfig {
    /// Portal URL.
    #[serde(default)]
    pub url: String,
    /// Environment served by this portal.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub env: String,
    /// Base64 access token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth: String,
    /// Secret holding the open-API token, when not inlined in `auth`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret: String,
}

impl Validate for ApolloConfig {
    fn validate(&self, v: &mut Validator) {
        v.url("url", &self.url);
        v.optional_base64("auth", &self.auth);
        v.optional_dns_label("secret", &self.secret);
    }
}

impl References for ApolloConfig {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("secret", Kind::Secret, &self.secret);
    }
}

/// A configuration service apps read their settings from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigCenterSpec {
    /// Apollo backend.
    #[serde(default)]
    pub apollo: ApolloConfig,
}

impl Validate for ConfigCenterSpec {
    fn validate(&self, v: &mut Validator) {
        v.nested("apollo", &self.apollo);
    }
}

impl References for ConfigCenterSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.nested("apollo", &self.apollo);
    }
}

/// API endpoint of a Kubernetes cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KubernetesCluster {
    /// API server URL.
    #[serde(default)]
    pub server: String,
    /// Base64 CA bundle.
    #[serde(default)]
    pub ca: String,
}

impl Validate for KubernetesCluster {
    fn validate(&self, v: &mut Validator) {
        v.url("server", &self.server);
        v.base64("ca", &self.ca);
    }
}

/// A Kubernetes deploy target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KubernetesPlatform {
    /// Cluster endpoint.
    #[serde(default)]
    pub cluster: KubernetesCluster,
    /// Secret with the client credentials.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret: String,
}

impl Validate for KubernetesPlatform {
    fn validate(&self, v: &mut Validator) {
        v.nested("cluster", &self.cluster);
        v.optional_dns_label("secret", &self.secret);
    }
}

impl References for KubernetesPlatform {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("secret", Kind::Secret, &self.secret);
    }
}

/// A docker-compose deploy target on host nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DockerPlatform {
    /// Compose file format version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub compose_version: String,
}

impl Validate for DockerPlatform {
    fn validate(&self, _v: &mut Validator) {}
}

/// Where apps in a zone are deployed. Exactly one platform is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeployPlatformSpec {
    /// Zone the platform serves.
    #[serde(default)]
    pub zone: String,
    /// Kubernetes target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesPlatform>,
    /// Docker target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerPlatform>,
}

impl Validate for DeployPlatformSpec {
    fn validate(&self, v: &mut Validator) {
        v.dns_label("zone", &self.zone);
        match (&self.kubernetes, &self.docker) {
            (Some(_), Some(_)) => v.error("", "only one of kubernetes or docker may be set"),
            (None, None) => v.error("", "one of kubernetes or docker is required"),
            _ => {},
        }
        if let Some(kubernetes) = &self.kubernetes {
            v.nested("kubernetes", kubernetes);
        }
        v.nested("docker", &self.docker);
    }
}

impl References for DeployPlatformSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("zone", Kind::Zone, &self.zone);
        walker.nested("kubernetes", &self.kubernetes);
    }
}
