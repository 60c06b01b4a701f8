//! Cross-resource reference discovery.
//!
//! Reference fields are declared statically: each spec type implements
//! [`References`] and reports its reference fields to a [`ReferenceWalker`],
//! recursing into nested structs, optional sections and lists. The walker
//! keeps the JSON path of every occurrence so that two fields naming the
//! same target are tracked separately.
//!
//! ```
//! use cmdb_resource::{Kind, Object, find_references, kinds::DatacenterSpec, Datacenter};
//!
//! let dc = Datacenter::new("dc1", DatacenterSpec {
//!     provider: "aliyun".into(),
//!     private_key: "dc1-key".into(),
//! });
//! let refs = find_references(&Object::from(dc));
//! assert_eq!(refs.len(), 1);
//! assert_eq!(refs[0].target_kind, Kind::Secret);
//! assert_eq!(refs[0].target_name, "dc1-key");
//! assert_eq!(refs[0].field_path, "spec.privateKey");
//! ```

use std::fmt;

use crate::registry::{Kind, Object};

/// One reference from a resource to another resource by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    /// Kind of the referenced resource.
    pub target_kind: Kind,
    /// Name of the referenced resource.
    pub target_name: String,
    /// JSON path of the field holding the name, e.g. `spec.hostNodes[1]`.
    pub field_path: String,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} (at {})", self.target_kind, self.target_name, self.field_path)
    }
}

/// Implemented by every type that can hold reference fields.
pub trait References {
    /// Reports each reference field of `self` to `walker`.
    fn visit_references(&self, walker: &mut ReferenceWalker);
}

impl<T: References> References for Option<T> {
    fn visit_references(&self, walker: &mut ReferenceWalker) {
        if let Some(inner) = self {
            inner.visit_references(walker);
        }
    }
}

/// Collects [`Reference`]s while tracking the current field path.
#[derive(Debug, Default)]
pub struct ReferenceWalker {
    path: Vec<String>,
    found: Vec<Reference>,
}

impl ReferenceWalker {
    /// Creates a walker rooted at the document top level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn field_path(&self, field: &str) -> String {
        let mut path = self.path.join(".");
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(field);
        path
    }

    /// Records a reference held by `field`. Empty names are not references.
    pub fn reference(&mut self, field: &str, target: Kind, name: &str) {
        if name.is_empty() {
            return;
        }
        let reference = Reference {
            target_kind: target,
            target_name: name.to_owned(),
            field_path: self.field_path(field),
        };
        if !self.found.contains(&reference) {
            self.found.push(reference);
        }
    }

    /// Records every name in a list field as `field[i]`.
    pub fn references(&mut self, field: &str, target: Kind, names: &[String]) {
        for (i, name) in names.iter().enumerate() {
            self.reference(&format!("{field}[{i}]"), target, name);
        }
    }

    /// Walks `value` with its fields nested under `field`.
    pub fn nested<T: References + ?Sized>(&mut self, field: &str, value: &T) {
        self.path.push(field.to_owned());
        value.visit_references(self);
        self.path.pop();
    }

    /// Walks every element of `items` under `field[i]`.
    pub fn each<T: References>(&mut self, field: &str, items: &[T]) {
        for (i, item) in items.iter().enumerate() {
            self.nested(&format!("{field}[{i}]"), item);
        }
    }

    /// Returns the references in discovery order.
    #[must_use]
    pub fn finish(self) -> Vec<Reference> {
        self.found
    }
}

/// Returns every reference held by `object`, deduplicated by target and
/// field path.
#[must_use]
pub fn find_references(object: &Object) -> Vec<Reference> {
    let mut walker = ReferenceWalker::new();
    object.visit_references(&mut walker);
    walker.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    struct Step {
        app: String,
    }

    impl References for Step {
        fn visit_references(&self, walker: &mut ReferenceWalker) {
            walker.reference("app", Kind::App, &self.app);
        }
    }

    struct Pipeline {
        primary: String,
        fallback: String,
        steps: Vec<Step>,
        nodes: Vec<String>,
    }

    impl References for Pipeline {
        fn visit_references(&self, walker: &mut ReferenceWalker) {
            walker.reference("primary", Kind::App, &self.primary);
            walker.reference("fallback", Kind::App, &self.fallback);
            walker.each("steps", &self.steps);
            walker.references("nodes", Kind::HostNode, &self.nodes);
        }
    }

    fn walk(pipeline: &Pipeline) -> Vec<Reference> {
        let mut walker = ReferenceWalker::new();
        walker.nested("spec", pipeline);
        walker.finish()
    }

    #[test]
    fn same_target_from_two_fields_is_kept_twice() {
        let refs = walk(&Pipeline {
            primary: "web".into(),
            fallback: "web".into(),
            steps: vec![],
            nodes: vec![],
        });
        let paths: Vec<_> = refs.iter().map(|r| r.field_path.as_str()).collect();
        assert_eq!(paths, vec!["spec.primary", "spec.fallback"]);
    }

    #[test]
    fn lists_and_nested_lists_are_indexed() {
        let refs = walk(&Pipeline {
            primary: String::new(),
            fallback: String::new(),
            steps: vec![Step { app: "a".into() }, Step { app: String::new() }, Step {
                app: "c".into(),
            }],
            nodes: vec!["n1".into(), "n2".into()],
        });
        let paths: Vec<_> = refs.iter().map(|r| r.field_path.as_str()).collect();
        assert_eq!(paths, vec![
            "spec.steps[0].app",
            "spec.steps[2].app",
            "spec.nodes[0]",
            "spec.nodes[1]"
        ]);
        assert_eq!(refs[2].target_kind, Kind::HostNode);
    }

    #[test]
    fn repeated_visit_is_deduplicated() {
        let mut walker = ReferenceWalker::new();
        walker.reference("spec.zone", Kind::Zone, "z1");
        walker.reference("spec.zone", Kind::Zone, "z1");
        assert_eq!(walker.finish().len(), 1);
    }

    proptest! {
        /// The walker reports one reference per non-empty list entry, never more.
        #[test]
        fn one_reference_per_non_empty_entry(
            nodes in proptest::collection::vec("[a-z]{0,4}", 0..12),
        ) {
            let pipeline = Pipeline {
                primary: String::new(),
                fallback: String::new(),
                steps: vec![],
                nodes: nodes.clone(),
            };
            let refs = walk(&pipeline);
            prop_assert_eq!(refs.len(), nodes.iter().filter(|n| !n.is_empty()).count());
        }
    }
}
