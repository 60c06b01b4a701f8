//! Resource fixtures for tests.
//!
//! Feature-gated behind `testutil`. [`all_fixtures`] returns one valid
//! object per kind, in apply order, and the fixtures reference each other:
//! creating them in order against an empty store succeeds, and every
//! reference field points at another fixture.
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use cmdb_resource::{Kind, testutil::fixture};
//!
//! let dc = fixture(Kind::Datacenter);
//! assert_eq!(dc.name(), "test");
//! ```

use std::collections::BTreeMap;

use crate::{
    kinds::*,
    registry::{
        App, AppDeployment, AppInstance, ConfigCenter, ContainerRegistry, Datacenter,
        DeployPlatform, DeployTemplate, HelmRepository, HostNode, Kind, Namespace, Object,
        Orchestration, Project, ResourceRange, Scm, Secret, Zone,
    },
};

/// Name shared by every fixture.
pub const FIXTURE_NAME: &str = "test";

/// Namespace of the namespaced fixtures.
pub const FIXTURE_NAMESPACE: &str = "test";

/// Base64 of `"test"`.
pub const FIXTURE_BASE64: &str = "dGVzdA==";

fn name() -> String {
    FIXTURE_NAME.to_owned()
}

/// A valid object of `kind` named [`FIXTURE_NAME`].
#[must_use]
pub fn fixture(kind: Kind) -> Object {
    match kind {
        Kind::Secret => Secret::new(FIXTURE_NAME, SecretSpec {
            data: BTreeMap::from([("privateKey".to_owned(), FIXTURE_BASE64.to_owned())]),
        })
        .into(),
        Kind::Project => {
            Project::new(FIXTURE_NAME, ProjectSpec { name_in_chain: "Test Project".into() }).into()
        },
        Kind::Datacenter => Datacenter::new(FIXTURE_NAME, DatacenterSpec {
            provider: "aliyun".into(),
            private_key: name(),
        })
        .into(),
        Kind::Zone => {
            Zone::new(FIXTURE_NAME, ZoneSpec { provider: "aliyun".into(), datacenter: name() })
                .into()
        },
        Kind::Namespace => Namespace::new(FIXTURE_NAME, NamespaceSpec {
            biz_env: "test".into(),
            biz_name: String::new(),
        })
        .into(),
        Kind::Scm => Scm::new(FIXTURE_NAME, ScmSpec {
            datacenter: name(),
            url: "https://git.example.com".into(),
            service: "gitlab".into(),
        })
        .into(),
        Kind::HostNode => HostNode::new(FIXTURE_NAME, HostNodeSpec {
            id: "i-test".into(),
            ip: "10.0.0.1".into(),
            zone: name(),
            private_key: name(),
            ..Default::default()
        })
        .into(),
        Kind::HelmRepository => HelmRepository::new(FIXTURE_NAME, HelmRepositorySpec {
            url: "https://charts.example.com".into(),
            auth: String::new(),
        })
        .into(),
        Kind::ContainerRegistry => ContainerRegistry::new(FIXTURE_NAME, ContainerRegistrySpec {
            url: "https://registry.example.com".into(),
            auth: RegistryAuth { user: "admin".into(), password: FIXTURE_BASE64.into() },
        })
        .into(),
        Kind::App => App::new(FIXTURE_NAME, AppSpec {
            project: name(),
            scm: AppScm { name: name(), project: "group/test".into(), user: "dev".into() },
        })
        .into(),
        Kind::ConfigCenter => ConfigCenter::new(FIXTURE_NAME, ConfigCenterSpec {
            apollo: ApolloConfig {
                url: "http://apollo.example.com".into(),
                secret: name(),
                ..Default::default()
            },
        })
        .into(),
        Kind::DeployPlatform => DeployPlatform::new(FIXTURE_NAME, DeployPlatformSpec {
            zone: name(),
            kubernetes: Some(KubernetesPlatform {
                cluster: KubernetesCluster {
                    server: "https://k8s.example.com:6443".into(),
                    ca: FIXTURE_BASE64.into(),
                },
                secret: name(),
            }),
            docker: None,
        })
        .into(),
        Kind::DeployTemplate => {
            DeployTemplate::namespaced(FIXTURE_NAME, FIXTURE_NAMESPACE, DeployTemplateSpec {
                deploy_args: "--set image={{image}}".into(),
                values: BTreeMap::new(),
            })
            .into()
        },
        Kind::ResourceRange => {
            ResourceRange::namespaced(FIXTURE_NAME, FIXTURE_NAMESPACE, ResourceRangeSpec {
                deploy_platform: name(),
                config_center: name(),
                container_registry: name(),
                helm_repository: name(),
                host_nodes: vec![name()],
            })
            .into()
        },
        Kind::Orchestration => Orchestration::new(FIXTURE_NAME, OrchestrationSpec {
            steps: vec![OrchestrationStep {
                name: "deploy".into(),
                app: name(),
                depends_on: Vec::new(),
            }],
        })
        .into(),
        Kind::AppDeployment => {
            AppDeployment::namespaced(FIXTURE_NAME, FIXTURE_NAMESPACE, AppDeploymentSpec {
                app: name(),
                resource_range: name(),
                deploy_template: DeployTemplateRef { name: name(), ..Default::default() },
                ..Default::default()
            })
            .into()
        },
        Kind::AppInstance => {
            AppInstance::namespaced(FIXTURE_NAME, FIXTURE_NAMESPACE, AppInstanceSpec {
                app_deployment: name(),
                host_node: name(),
                ..Default::default()
            })
            .into()
        },
    }
}

/// One fixture per kind, in apply order.
#[must_use]
pub fn all_fixtures() -> Vec<Object> {
    Kind::ALL.iter().copied().map(fixture).collect()
}

/// The fixture of `kind`, renamed.
#[must_use]
pub fn named_fixture(kind: Kind, name: &str) -> Object {
    let mut object = fixture(kind);
    object.meta_mut().name = name.to_owned();
    object
}
