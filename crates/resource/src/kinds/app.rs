//! Application kinds: what is built, how it is rolled out and what runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    reference::{ReferenceWalker, References},
    registry::Kind,
    validation::{Validate, Validator},
};

/// Location of an app's code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AppScm {
    /// SCM service hosting the repository.
    #[serde(default)]
    pub name: String,
    /// Repository group or project path.
    #[serde(default)]
    pub project: String,
    /// Repository owner.
    #[serde(default)]
    pub user: String,
}

impl Validate for AppScm {
    fn validate(&self, v: &mut Validator) {
        v.dns_label("name", &self.name);
        v.required("project", &self.project);
        v.required("user", &self.user);
    }
}

impl References for AppScm {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("name", Kind::Scm, &self.name);
    }
}

/// A deployable application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AppSpec {
    /// Owning project.
    #[serde(default)]
    pub project: String,
    /// Source location.
    #[serde(default)]
    pub scm: AppScm,
}

impl Validate for AppSpec {
    fn validate(&self, v: &mut Validator) {
        v.dns_label("project", &self.project);
        v.nested("scm", &self.scm);
    }
}

impl References for AppSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("project", Kind::Project, &self.project);
        walker.nested("scm", &self.scm);
    }
}

/// A parameterised rollout recipe, rendered per deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeployTemplateSpec {
    /// Template body handed to the renderer.
    #[serde(default)]
    pub deploy_args: String,
    /// Default values for template parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
}

impl Validate for DeployTemplateSpec {
    fn validate(&self, v: &mut Validator) {
        v.required("deployArgs", &self.deploy_args);
    }
}

impl References for DeployTemplateSpec {
    fn visit_references(&self, _walker: &mut ReferenceWalker) {}
}

/// The set of infrastructure a namespace may deploy into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceRangeSpec {
    /// Target platform.
    #[serde(default)]
    pub deploy_platform: String,
    /// Configuration service, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config_center: String,
    /// Image registry, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_registry: String,
    /// Chart repository, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub helm_repository: String,
    /// Nodes usable by docker deployments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_nodes: Vec<String>,
}

impl Validate for ResourceRangeSpec {
    fn validate(&self, v: &mut Validator) {
        v.dns_label("deployPlatform", &self.deploy_platform);
        v.optional_dns_label("configCenter", &self.config_center);
        v.optional_dns_label("containerRegistry", &self.container_registry);
        v.optional_dns_label("helmRepository", &self.helm_repository);
        v.dns_labels("hostNodes", &self.host_nodes);
    }
}

impl References for ResourceRangeSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("deployPlatform", Kind::DeployPlatform, &self.deploy_platform);
        walker.reference("configCenter", Kind::ConfigCenter, &self.config_center);
        walker.reference("containerRegistry", Kind::ContainerRegistry, &self.container_registry);
        walker.reference("helmRepository", Kind::HelmRepository, &self.helm_repository);
        walker.references("hostNodes", Kind::HostNode, &self.host_nodes);
    }
}

/// One step of an orchestration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrchestrationStep {
    /// Step name, unique within the orchestration.
    #[serde(default)]
    pub name: String,
    /// App rolled out by this step.
    #[serde(default)]
    pub app: String,
    /// Steps that must finish first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Validate for OrchestrationStep {
    fn validate(&self, v: &mut Validator) {
        v.required("name", &self.name);
        v.dns_label("app", &self.app);
    }
}

impl References for OrchestrationStep {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("app", Kind::App, &self.app);
    }
}

/// An ordered multi-app rollout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrchestrationSpec {
    /// Steps in declaration order.
    #[serde(default)]
    pub steps: Vec<OrchestrationStep>,
}

impl Validate for OrchestrationSpec {
    fn validate(&self, v: &mut Validator) {
        if v.non_empty_list("steps", &self.steps) {
            v.each("steps", &self.steps);
        }
        for (i, step) in self.steps.iter().enumerate() {
            for (j, dependency) in step.depends_on.iter().enumerate() {
                if !self.steps.iter().any(|other| &other.name == dependency) {
                    v.error(
                        &format!("steps[{i}].dependsOn[{j}]"),
                        format!("unknown step {dependency:?}"),
                    );
                }
            }
        }
    }
}

impl References for OrchestrationSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.each("steps", &self.steps);
    }
}

/// The deploy template an app deployment renders, with overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeployTemplateRef {
    /// Template name, resolved in the deployment's namespace.
    #[serde(default)]
    pub name: String,
    /// Parameter overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
    /// Extra renderer arguments.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deploy_args: BTreeMap<String, String>,
}

impl Validate for DeployTemplateRef {
    fn validate(&self, v: &mut Validator) {
        v.dns_label("name", &self.name);
    }
}

impl References for DeployTemplateRef {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("name", Kind::DeployTemplate, &self.name);
    }
}

/// Rollout phase of an app deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeploymentPhase {
    /// Not yet rolled out.
    #[default]
    Pending,
    /// Rollout in progress.
    Deploying,
    /// Last rollout finished.
    Deployed,
    /// Last rollout failed.
    Failed,
}

/// Rollout state reported by the deployment resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AppDeploymentStatus {
    /// Current phase.
    #[serde(default)]
    pub phase: DeploymentPhase,
    /// Detail for the phase, usually an error.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Validate for AppDeploymentStatus {
    fn validate(&self, _v: &mut Validator) {}
}

/// An app rolled out into a resource range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AppDeploymentSpec {
    /// App being deployed.
    #[serde(default)]
    pub app: String,
    /// Infrastructure scope, resolved in the deployment's namespace.
    #[serde(default)]
    pub resource_range: String,
    /// Rollout recipe.
    #[serde(default)]
    pub deploy_template: DeployTemplateRef,
    /// Desired instance count; `0` leaves the choice to the template.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub replicas: u32,
    /// Last reported rollout state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppDeploymentStatus>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl Validate for AppDeploymentSpec {
    fn validate(&self, v: &mut Validator) {
        v.dns_label("app", &self.app);
        v.dns_label("resourceRange", &self.resource_range);
        v.nested("deployTemplate", &self.deploy_template);
        v.nested("status", &self.status);
    }
}

impl References for AppDeploymentSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("app", Kind::App, &self.app);
        walker.reference("resourceRange", Kind::ResourceRange, &self.resource_range);
        walker.nested("deployTemplate", &self.deploy_template);
    }
}

/// Lifecycle of one running instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstancePhase {
    /// Scheduled, not yet running.
    #[default]
    Pending,
    /// Serving.
    Running,
    /// Stopped or crashed.
    Stopped,
}

/// One running copy of an app deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AppInstanceSpec {
    /// Deployment the instance belongs to.
    #[serde(default)]
    pub app_deployment: String,
    /// Node the instance runs on; empty for cluster-scheduled instances.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_node: String,
    /// Image or artifact version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Lifecycle phase.
    #[serde(default)]
    pub phase: InstancePhase,
}

impl Validate for AppInstanceSpec {
    fn validate(&self, v: &mut Validator) {
        v.dns_label("appDeployment", &self.app_deployment);
        v.optional_dns_label("hostNode", &self.host_node);
    }
}

impl References for AppInstanceSpec {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        walker.reference("appDeployment", Kind::AppDeployment, &self.app_deployment);
        walker.reference("hostNode", Kind::HostNode, &self.host_node);
    }
}
