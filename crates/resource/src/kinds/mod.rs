//! Kind-specific `spec` payloads.
//!
//! Each spec struct declares its own field rules ([`Validate`](crate::Validate))
//! and reference fields ([`References`](crate::References)); paths reported
//! from here are relative to `spec`.

mod app;
mod infra;
mod tooling;

pub use app::{
    AppDeploymentSpec, AppDeploymentStatus, AppInstanceSpec, AppScm, AppSpec, DeployTemplateRef,
    DeployTemplateSpec, DeploymentPhase, InstancePhase, OrchestrationSpec, OrchestrationStep,
    ResourceRangeSpec,
};
pub use infra::{
    DatacenterSpec, HostNodeSpec, NamespaceSpec, ProjectSpec, ScmSpec, SecretSpec, ZoneSpec,
};
pub use tooling::{
    ApolloConfig, ConfigCenterSpec, ContainerRegistrySpec, DeployPlatformSpec, DockerPlatform,
    HelmRepositorySpec, KubernetesCluster, KubernetesPlatform, RegistryAuth,
};
