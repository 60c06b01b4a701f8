//! Key layout.
//!
//! ```text
//! {prefix}/{lowercase(kind)}s/[{namespace}/]{name}                         primary record
//! {prefix}/references/{targetKind}/{targetName}/{referrerKind}/{referrerName}  reference edge
//! ```
//!
//! Tooling reads the backend directly, so this layout is fixed. Edge keys
//! carry kinds in their canonical spelling and hold an empty value.

use cmdb_resource::{Kind, Reference};

const REFERENCES_SEGMENT: &str = "references";

#[derive(Debug, Clone)]
pub(crate) struct KeyLayout {
    root: String,
}

impl KeyLayout {
    pub(crate) fn new(path_prefix: &str) -> Self {
        Self { root: path_prefix.trim_end_matches('/').to_owned() }
    }

    /// Primary key of one object.
    pub(crate) fn object(&self, kind: Kind, namespace: &str, name: &str) -> String {
        let mut key = format!("{}/{}/", self.root, kind.storage_segment());
        if kind.is_namespaced() {
            key.push_str(namespace);
            key.push('/');
        }
        key.push_str(name);
        key
    }

    /// Prefix covering the objects of `kind`, narrowed to `namespace` when
    /// the kind is namespaced and a namespace is given.
    pub(crate) fn scope(&self, kind: Kind, namespace: Option<&str>) -> String {
        let mut key = format!("{}/{}/", self.root, kind.storage_segment());
        if let Some(namespace) = namespace.filter(|ns| kind.is_namespaced() && !ns.is_empty()) {
            key.push_str(namespace);
            key.push('/');
        }
        key
    }

    /// Primary key of the object `reference` points at. Namespaced targets
    /// resolve in the referrer's namespace.
    pub(crate) fn target(&self, reference: &Reference, referrer_namespace: &str) -> String {
        self.object(reference.target_kind, referrer_namespace, &reference.target_name)
    }

    /// Edge recording that `referrer_kind/referrer_name` points at the
    /// target of `reference`.
    pub(crate) fn edge(&self, reference: &Reference, referrer_kind: Kind, referrer_name: &str) -> String {
        format!(
            "{}{}/{}",
            self.edges_to(reference.target_kind, &reference.target_name),
            referrer_kind,
            referrer_name
        )
    }

    /// Prefix covering every edge that points at `kind/name`.
    pub(crate) fn edges_to(&self, kind: Kind, name: &str) -> String {
        format!("{}/{REFERENCES_SEGMENT}/{kind}/{name}/", self.root)
    }
}

/// Last path segment of a key.
pub(crate) fn name_of(key: &[u8]) -> String {
    let key = String::from_utf8_lossy(key);
    key.rsplit('/').next().unwrap_or_default().to_owned()
}

/// `(referrerKind, referrerName)` of an edge key.
pub(crate) fn referrer_of(edge_key: &[u8]) -> (String, String) {
    let key = String::from_utf8_lossy(edge_key);
    let mut segments = key.rsplit('/');
    let name = segments.next().unwrap_or_default().to_owned();
    let kind = segments.next().unwrap_or_default().to_owned();
    (kind, name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn reference(kind: Kind, name: &str) -> Reference {
        Reference { target_kind: kind, target_name: name.into(), field_path: "spec.x".into() }
    }

    #[test]
    fn primary_keys() {
        let keys = KeyLayout::new("/registry");
        assert_eq!(keys.object(Kind::Scm, "", "gitlab"), "/registry/scms/gitlab");
        assert_eq!(keys.object(Kind::Datacenter, "ignored", "dc1"), "/registry/datacenters/dc1");
        assert_eq!(
            keys.object(Kind::AppDeployment, "prod", "web"),
            "/registry/appdeployments/prod/web"
        );
    }

    #[test]
    fn scopes() {
        let keys = KeyLayout::new("/registry");
        assert_eq!(keys.scope(Kind::AppInstance, Some("prod")), "/registry/appinstances/prod/");
        assert_eq!(keys.scope(Kind::AppInstance, Some("")), "/registry/appinstances/");
        assert_eq!(keys.scope(Kind::AppInstance, None), "/registry/appinstances/");
        assert_eq!(keys.scope(Kind::Zone, Some("prod")), "/registry/zones/");
    }

    #[test]
    fn sibling_kinds_do_not_share_a_scope() {
        let keys = KeyLayout::new("/registry");
        let apps = keys.scope(Kind::App, None);
        let deployment = keys.object(Kind::AppDeployment, "prod", "web");
        assert!(!deployment.starts_with(&apps));
    }

    #[test]
    fn edge_keys() {
        let keys = KeyLayout::new("/registry");
        let edge = keys.edge(&reference(Kind::Secret, "key1"), Kind::Datacenter, "dc1");
        assert_eq!(edge, "/registry/references/Secret/key1/Datacenter/dc1");
        assert!(edge.starts_with(&keys.edges_to(Kind::Secret, "key1")));
        assert!(!edge.starts_with(&keys.edges_to(Kind::Secret, "key")));
        assert_eq!(referrer_of(edge.as_bytes()), ("Datacenter".to_owned(), "dc1".to_owned()));
    }

    #[test]
    fn namespaced_target_resolves_in_referrer_namespace() {
        let keys = KeyLayout::new("/registry");
        assert_eq!(
            keys.target(&reference(Kind::ResourceRange, "rr"), "prod"),
            "/registry/resourceranges/prod/rr"
        );
        assert_eq!(keys.target(&reference(Kind::App, "web"), "prod"), "/registry/apps/web");
    }

    #[test]
    fn root_prefix_does_not_double_slash() {
        let keys = KeyLayout::new("/");
        assert_eq!(keys.object(Kind::Secret, "", "s"), "/secrets/s");
        assert_eq!(keys.edges_to(Kind::Secret, "s"), "/references/Secret/s/");
    }

    proptest! {
        /// The name read back from a primary key is the name it was built from.
        #[test]
        fn name_round_trips(
            namespace in "[a-z][a-z0-9-]{0,10}",
            name in "[a-z][a-z0-9-]{0,20}",
            kind_idx in 0..Kind::ALL.len(),
        ) {
            let kind = Kind::ALL[kind_idx];
            let key = KeyLayout::new("/registry").object(kind, &namespace, &name);
            prop_assert_eq!(name_of(key.as_bytes()), name);
        }
    }
}
