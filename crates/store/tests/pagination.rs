//! Listing: creation order, page windows, selectors and namespace scope.

#![allow(clippy::expect_used)]

use cmdb_resource::{DeployTemplate, DeployTemplateSpec, Object};
use cmdb_storage::MemoryBackend;
use cmdb_store::{ListOptions, Store, StoreConfig};

const NAMESPACE: &str = "apps";
const TEMPLATES: usize = 10;

fn template(name: &str, namespace: &str) -> Object {
    DeployTemplate::namespaced(name, namespace, DeployTemplateSpec {
        deploy_args: "--wait".into(),
        ..Default::default()
    })
    .into()
}

/// Ten templates created in reverse name order, even ones labelled
/// `parity=even`. Returns the names in creation order.
async fn seeded() -> (Store<MemoryBackend>, Vec<String>) {
    let store = Store::new(MemoryBackend::new(), StoreConfig::default());
    let mut created = Vec::new();
    for i in (0..TEMPLATES).rev() {
        let name = format!("t{i:02}");
        let mut object = template(&name, NAMESPACE);
        if i % 2 == 0 {
            object.meta_mut().labels.insert("parity".into(), "even".into());
        }
        store.create(object).await.expect("create");
        created.push(name);
    }
    (store, created)
}

async fn names(store: &Store<MemoryBackend>, namespace: &str, opts: &ListOptions) -> Vec<String> {
    store
        .get_list("DeployTemplate", namespace, opts)
        .await
        .expect("list")
        .iter()
        .map(|o| o.name().to_owned())
        .collect()
}

// ============================================================================
// Pages
// ============================================================================

#[tokio::test]
async fn pages_follow_creation_order() {
    let (store, created) = seeded().await;

    assert_eq!(names(&store, NAMESPACE, &ListOptions::paged(1, 3)).await, created[0..3]);
    assert_eq!(names(&store, NAMESPACE, &ListOptions::paged(2, 3)).await, created[3..6]);
    assert_eq!(names(&store, NAMESPACE, &ListOptions::paged(4, 3)).await, created[9..10]);
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let (store, _) = seeded().await;
    // ceil(10 / 3) + 1
    assert!(names(&store, NAMESPACE, &ListOptions::paged(5, 3)).await.is_empty());
    assert!(names(&store, NAMESPACE, &ListOptions::paged(usize::MAX, usize::MAX)).await.is_empty());
}

#[tokio::test]
async fn page_zero_reads_as_first_page() {
    let (store, created) = seeded().await;
    assert_eq!(names(&store, NAMESPACE, &ListOptions::paged(0, 4)).await, created[0..4]);
}

#[tokio::test]
async fn zero_or_oversized_limit_returns_everything() {
    let (store, created) = seeded().await;
    assert_eq!(names(&store, NAMESPACE, &ListOptions::paged(1, 0)).await, created);
    assert_eq!(names(&store, NAMESPACE, &ListOptions::paged(1, 50)).await, created);
}

#[tokio::test]
async fn deleted_objects_leave_no_gap() {
    let (store, created) = seeded().await;
    store.delete("DeployTemplate", &created[1], NAMESPACE).await.expect("delete");

    let expected = vec![created[0].clone(), created[2].clone(), created[3].clone()];
    assert_eq!(names(&store, NAMESPACE, &ListOptions::paged(1, 3)).await, expected);
}

#[tokio::test]
async fn listed_objects_carry_counters() {
    let (store, _) = seeded().await;
    let objects = store
        .get_list("DeployTemplate", NAMESPACE, &ListOptions::paged(1, 3))
        .await
        .expect("list");
    let revisions: Vec<i64> = objects.iter().map(|o| o.meta().create_revision).collect();
    assert!(revisions.windows(2).all(|w| w[0] < w[1]), "{revisions:?}");
    assert!(objects.iter().all(|o| o.meta().version == 1));
}

// ============================================================================
// Selectors
// ============================================================================

#[tokio::test]
async fn label_selector_filters_whole_scope() {
    let (store, created) = seeded().await;
    let even: Vec<String> = created.iter().filter(|n| n.ends_with(['0', '2', '4', '6', '8'])).cloned().collect();

    let opts = ListOptions::paged(1, 2).with_label("parity", "even");
    assert_eq!(names(&store, NAMESPACE, &opts).await, even);

    let none = ListOptions::default().with_label("parity", "odd");
    assert!(names(&store, NAMESPACE, &none).await.is_empty());
}

#[tokio::test]
async fn field_selector_is_ignored() {
    let (store, created) = seeded().await;
    let mut opts = ListOptions::default();
    opts.field_selector.insert("metadata.name".into(), "t03".into());
    assert_eq!(names(&store, NAMESPACE, &opts).await, created);
}

// ============================================================================
// Namespace scope
// ============================================================================

#[tokio::test]
async fn namespace_narrows_unless_all() {
    let store = Store::new(MemoryBackend::new(), StoreConfig::default());
    store.create(template("web", "alpha")).await.expect("create");
    store.create(template("api", "beta")).await.expect("create");

    assert_eq!(names(&store, "alpha", &ListOptions::default()).await, vec!["web"]);
    assert_eq!(names(&store, "", &ListOptions::default()).await, vec!["web", "api"]);
    assert_eq!(names(&store, "alpha", &ListOptions::all()).await, vec!["web", "api"]);
    assert!(names(&store, "gamma", &ListOptions::default()).await.is_empty());
}

#[tokio::test]
async fn all_ignores_limit() {
    let (store, created) = seeded().await;
    let mut opts = ListOptions::all();
    opts.limit = 2;
    assert_eq!(names(&store, NAMESPACE, &opts).await, created);
}
