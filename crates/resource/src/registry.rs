//! The resource type registry.
//!
//! The catalogue is closed: [`define_kinds!`] expands one table into the
//! [`Kind`] discriminator, the [`Object`] sum type, one `Resource<Spec>`
//! alias per kind and the per-kind dispatch used by the codec, validation
//! and reference discovery. Adding a kind means adding one row.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};

use crate::{
    error::{ResourceError, ResourceResult},
    kinds::*,
    meta::{API_VERSION, ObjectMeta, Resource},
    reference::{ReferenceWalker, References},
    validation::{Validate, Validator},
};

/// Implemented by every kind-specific payload.
pub trait Spec:
    Default + Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Validate + References
{
    /// The kind this payload belongs to.
    const KIND: Kind;
}

impl<S: Spec> Resource<S> {
    /// A cluster-scoped resource named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: S) -> Self {
        Self {
            api_version: API_VERSION.to_owned(),
            kind: S::KIND.as_str().to_owned(),
            metadata: ObjectMeta::named(name),
            description: String::new(),
            spec,
        }
    }

    /// A resource named `name` in `namespace`.
    #[must_use]
    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>, spec: S) -> Self {
        let mut resource = Self::new(name, spec);
        resource.metadata.namespace = namespace.into();
        resource
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }
}

/// Generates the kind catalogue.
///
/// Rows are listed in apply order: a kind only references kinds listed
/// before it.
macro_rules! define_kinds {
    ($(
        $(#[$doc:meta])*
        $variant:ident => $name:literal, $spec:ty, namespaced = $namespaced:literal;
    )+) => {
        /// The discriminator of a resource.
        ///
        /// Variants are declared in apply order, so `Ord` sorts referenced
        /// kinds before their referrers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Kind {
            $( $(#[$doc])* $variant, )+
        }

        impl Kind {
            /// Every kind, in apply order.
            pub const ALL: &'static [Kind] = &[$( Kind::$variant, )+];

            /// The canonical spelling.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Kind::$variant => $name, )+
                }
            }

            /// Whether the namespace is part of the identity.
            #[must_use]
            pub const fn is_namespaced(self) -> bool {
                match self {
                    $( Kind::$variant => $namespaced, )+
                }
            }

            /// An empty resource of this kind.
            #[must_use]
            pub fn zero(self) -> Object {
                match self {
                    $( Kind::$variant => Object::$variant(Resource::<$spec>::new("", <$spec>::default())), )+
                }
            }

            pub(crate) fn parse(self, value: serde_json::Value) -> ResourceResult<Object> {
                let context = self.as_str();
                match self {
                    $(
                        Kind::$variant => serde_json::from_value::<Resource<$spec>>(value)
                            .map(Object::$variant)
                            .map_err(|err| ResourceError::from_json(context, err)),
                    )+
                }
            }
        }

        $(
            $(#[$doc])*
            pub type $variant = Resource<$spec>;

            impl Spec for $spec {
                const KIND: Kind = Kind::$variant;
            }

            impl From<Resource<$spec>> for Object {
                fn from(resource: Resource<$spec>) -> Self {
                    Object::$variant(resource)
                }
            }
        )+

        /// A resource of any registered kind.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Object {
            $( $(#[$doc])* $variant(Resource<$spec>), )+
        }

        impl Object {
            /// The kind this object was constructed as.
            #[must_use]
            pub fn kind(&self) -> Kind {
                match self {
                    $( Object::$variant(_) => Kind::$variant, )+
                }
            }

            /// Identity and bookkeeping.
            #[must_use]
            pub fn meta(&self) -> &ObjectMeta {
                match self {
                    $( Object::$variant(resource) => &resource.metadata, )+
                }
            }

            /// Mutable identity and bookkeeping.
            pub fn meta_mut(&mut self) -> &mut ObjectMeta {
                match self {
                    $( Object::$variant(resource) => &mut resource.metadata, )+
                }
            }

            /// The `kind` string carried by the document.
            #[must_use]
            pub fn declared_kind(&self) -> &str {
                match self {
                    $( Object::$variant(resource) => &resource.kind, )+
                }
            }

            /// Human-readable description.
            #[must_use]
            pub fn description(&self) -> &str {
                match self {
                    $( Object::$variant(resource) => &resource.description, )+
                }
            }

            /// Rewrites `kind` and `apiVersion` to their canonical values.
            pub fn canonicalize(&mut self) {
                match self {
                    $(
                        Object::$variant(resource) => {
                            resource.kind = Kind::$variant.as_str().to_owned();
                            if resource.api_version.is_empty() {
                                resource.api_version = API_VERSION.to_owned();
                            }
                        },
                    )+
                }
            }

            fn validate_spec(&self, v: &mut Validator) {
                match self {
                    $( Object::$variant(resource) => v.nested("spec", &resource.spec), )+
                }
            }
        }

        impl References for Object {
            fn visit_references(&self, walker: &mut ReferenceWalker) {
                match self {
                    $( Object::$variant(resource) => walker.nested("spec", &resource.spec), )+
                }
            }
        }

        impl Serialize for Object {
            fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
                match self {
                    $( Object::$variant(resource) => resource.serialize(serializer), )+
                }
            }
        }
    };
}

define_kinds! {
    /// Credential material.
    Secret => "Secret", SecretSpec, namespaced = false;
    /// A business project.
    Project => "Project", ProjectSpec, namespaced = false;
    /// A cloud or on-premise site.
    Datacenter => "Datacenter", DatacenterSpec, namespaced = false;
    /// An availability zone.
    Zone => "Zone", ZoneSpec, namespaced = false;
    /// A business environment.
    Namespace => "Namespace", NamespaceSpec, namespaced = false;
    /// A source-control service.
    Scm => "SCM", ScmSpec, namespaced = false;
    /// A machine apps can run on.
    HostNode => "HostNode", HostNodeSpec, namespaced = false;
    /// A Helm chart repository.
    HelmRepository => "HelmRepository", HelmRepositorySpec, namespaced = false;
    /// An image registry.
    ContainerRegistry => "ContainerRegistry", ContainerRegistrySpec, namespaced = false;
    /// A deployable application.
    App => "App", AppSpec, namespaced = false;
    /// A configuration service.
    ConfigCenter => "ConfigCenter", ConfigCenterSpec, namespaced = false;
    /// A deploy target.
    DeployPlatform => "DeployPlatform", DeployPlatformSpec, namespaced = false;
    /// A rollout recipe.
    DeployTemplate => "DeployTemplate", DeployTemplateSpec, namespaced = true;
    /// Infrastructure available to a namespace.
    ResourceRange => "ResourceRange", ResourceRangeSpec, namespaced = true;
    /// A multi-app rollout.
    Orchestration => "Orchestration", OrchestrationSpec, namespaced = false;
    /// An app rolled out into a resource range.
    AppDeployment => "AppDeployment", AppDeploymentSpec, namespaced = true;
    /// One running copy of an app deployment.
    AppInstance => "AppInstance", AppInstanceSpec, namespaced = true;
}

impl Kind {
    /// Position in the apply order; lower is applied first.
    #[must_use]
    pub fn apply_priority(self) -> usize {
        self as usize
    }

    /// Key segment for this kind's records, e.g. `hostnodes`.
    #[must_use]
    pub fn storage_segment(self) -> String {
        format!("{}s", self.as_str().to_ascii_lowercase())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ResourceError::unknown_kind(s))
    }
}

impl Object {
    /// The object's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.meta().name
    }

    /// The object's namespace; empty for cluster-scoped kinds.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.meta().namespace
    }

    /// Checks identity rules and the kind's field rules.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Invalid`] listing every failing field.
    pub fn validate(&self) -> ResourceResult<()> {
        let kind = self.kind();
        let mut v = Validator::new();

        let declared = self.declared_kind();
        if !declared.eq_ignore_ascii_case(kind.as_str()) {
            v.error("kind", format!("must be {kind}, got {declared:?}"));
        }

        let meta = self.meta();
        v.dns_label("metadata.name", &meta.name);
        if kind.is_namespaced() {
            v.dns_label("metadata.namespace", &meta.namespace);
        } else if !meta.namespace.is_empty() {
            v.error("metadata.namespace", format!("must be empty, {kind} is not namespaced"));
        }

        self.validate_spec(&mut v);
        v.finish().map_err(ResourceError::from)
    }
}

impl<'de> Deserialize<'de> for Object {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        crate::codec::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.meta();
        if meta.namespace.is_empty() {
            write!(f, "{}/{}", self.kind(), meta.name)
        } else {
            write!(f, "{}/{}/{}", self.kind(), meta.namespace, meta.name)
        }
    }
}

/// Resolves a kind name to an empty resource of that kind and whether the
/// kind is namespaced.
///
/// # Errors
///
/// Returns [`ResourceError::UnknownKind`] if no kind matches, ignoring case.
pub fn resolve(kind: &str) -> ResourceResult<(Object, bool)> {
    let kind = kind.parse::<Kind>()?;
    Ok((kind.zero(), kind.is_namespaced()))
}

/// Orders objects so referenced kinds come before their referrers.
pub fn sort_for_apply(objects: &mut [Object]) {
    objects.sort_by_key(|object| object.kind().apply_priority());
}

/// Orders objects so referrers come before the kinds they reference.
pub fn sort_for_delete(objects: &mut [Object]) {
    objects.sort_by_key(|object| std::cmp::Reverse(object.kind().apply_priority()));
}
