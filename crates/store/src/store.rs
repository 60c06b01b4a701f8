//! The resource store.
//!
//! [`Store`] maps [`Object`]s onto a [`KvBackend`] and keeps the reference
//! graph consistent with them. Every mutation is a single guarded
//! transaction:
//!
//! | Operation | Guards | Writes |
//! |-----------|--------|--------|
//! | create | primary absent, every target exists | primary, edges |
//! | update | primary mod revision unchanged, every target exists, released edges unchanged | primary, stale edges deleted, edges |
//! | delete | primary mod revision unchanged, released edges unchanged | primary and own edges deleted |
//!
//! When a transaction fails the store re-reads to tell the caller why. A
//! missing target or an existing primary is reported as such; anything else
//! means another writer got there first, and the cycle is retried under
//! [`CasRetryConfig`](crate::CasRetryConfig).
//!
//! Delete checks the back-index before its transaction. A referrer created
//! in between is not seen; backends offer no guard on "prefix is empty".
//!
//! Edge keys name the referrer without its namespace, so same-named
//! referrers of a namespaced kind share their edges. An edge is only
//! released when no sibling in another namespace still holds it, and the
//! releasing transaction is guarded on every sibling and on the edge itself.

use std::collections::BTreeSet;

use chrono::Utc;
use cmdb_resource::{Kind, Object, Reference, ResourceError, codec, find_references};
use cmdb_storage::{
    Compare, HealthProbe, HealthStatus, KeyValue, KvBackend, RangeRequest, SortOrder, SortTarget,
    StorageError,
};
use tracing::{debug, warn};

use crate::{
    config::StoreConfig,
    error::{StoreError, StoreResult},
    keys::{KeyLayout, name_of, referrer_of},
    options::{GetOptions, ListOptions, page_window},
    retry::{with_cas_retry, with_deadline},
};

/// Generic store for every registered resource kind.
///
/// Holds a backend handle and its configuration, nothing else; all
/// coordination between concurrent callers happens in backend
/// transactions. Cloning is as cheap as cloning the backend handle.
#[derive(Debug, Clone)]
pub struct Store<B> {
    backend: B,
    config: StoreConfig,
    keys: KeyLayout,
}

impl<B: KvBackend> Store<B> {
    /// Creates a store over `backend`.
    #[must_use]
    pub fn new(backend: B, config: StoreConfig) -> Self {
        let keys = KeyLayout::new(config.path_prefix());
        Self { backend, config, keys }
    }

    /// The backend handle.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The configuration the store was created with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Reads one object.
    ///
    /// The returned object carries the backend's counters in
    /// `metadata.createRevision`, `metadata.revision` and
    /// `metadata.version`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnknownKind`] if `kind` does not resolve
    /// - [`StoreError::KeyNotFound`] if nothing is stored and `opts.ignore_not_found` is unset
    /// - [`StoreError::Schema`] if the stored document does not decode
    #[tracing::instrument(skip(self, opts), fields(ignore_not_found = opts.ignore_not_found))]
    pub async fn get(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
        opts: &GetOptions,
    ) -> StoreResult<Option<Object>> {
        let kind = parse_kind(kind)?;
        let key = self.keys.object(kind, namespace, name);
        match self.backend.get(key.as_bytes()).await? {
            Some(kv) => decode(&kv).map(Some),
            None if opts.ignore_not_found => Ok(None),
            None => Err(StoreError::key_not_found(key)),
        }
    }

    /// Counts the objects of `kind`, within `namespace` for namespaced
    /// kinds (an empty namespace counts every namespace).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownKind`] or a backend error.
    #[tracing::instrument(skip(self))]
    pub async fn count(&self, kind: &str, namespace: &str) -> StoreResult<u64> {
        let kind = parse_kind(kind)?;
        let scope = self.keys.scope(kind, Some(namespace));
        let response = self.backend.range(RangeRequest::prefix(scope).count_only()).await?;
        Ok(response.count)
    }

    /// Names of the objects of `kind`, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownKind`] or a backend error.
    #[tracing::instrument(skip(self))]
    pub async fn get_names(&self, kind: &str, namespace: &str) -> StoreResult<Vec<String>> {
        let kind = parse_kind(kind)?;
        let scope = self.keys.scope(kind, Some(namespace));
        let response = self.backend.range(RangeRequest::prefix(scope).keys_only()).await?;
        Ok(response.kvs.iter().map(|kv| name_of(&kv.key)).collect())
    }

    /// Lists objects of `kind` in creation order.
    ///
    /// Without a label selector the page is found with a keys-only scan
    /// and fetched with a second scan bounded by the creation revisions of
    /// its first and last key. A page past the end is empty, not an error.
    /// With a label selector the whole scope is read and filtered; `page`
    /// and `limit` do not apply.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownKind`], [`StoreError::Schema`] for an
    /// undecodable record, or a backend error.
    #[tracing::instrument(skip(self, opts), fields(page = opts.page, limit = opts.limit, all = opts.all))]
    pub async fn get_list(
        &self,
        kind: &str,
        namespace: &str,
        opts: &ListOptions,
    ) -> StoreResult<Vec<Object>> {
        let kind = parse_kind(kind)?;
        let scope = self.keys.scope(kind, (!opts.all).then_some(namespace));
        let by_creation = RangeRequest::prefix(scope.clone())
            .sort_by(SortTarget::CreateRevision, SortOrder::Ascend);

        if !opts.field_selector.is_empty() {
            warn!(
                field_selector = %crate::options::encode_selector(&opts.field_selector),
                "field selectors are not supported; ignoring",
            );
        }

        let limit = if opts.all { 0 } else { opts.limit };
        if opts.has_selector() || limit == 0 {
            let response = self.backend.range(by_creation).await?;
            let mut objects = Vec::with_capacity(response.kvs.len());
            for kv in &response.kvs {
                let object = decode(kv)?;
                if object.meta().matches_labels(&opts.label_selector) {
                    objects.push(object);
                }
            }
            return Ok(objects);
        }

        let page = opts.page.max(1);
        let window_end = page.saturating_mul(limit);
        let keys = self.backend.range(by_creation.clone().keys_only().limit(window_end)).await?;
        let Some((first, last)) = page_window(page, limit, keys.kvs.len()) else {
            debug!(total = keys.count, "page starts past the end");
            return Ok(Vec::new());
        };
        let (min, max) = (keys.kvs[first].create_revision, keys.kvs[last].create_revision);

        let response = self
            .backend
            .range(by_creation.min_create_revision(min).max_create_revision(max).limit(limit))
            .await?;
        response.kvs.iter().map(decode).collect()
    }

    /// Stores a new object and the reference edges it holds.
    ///
    /// Returns the stored object with its counters.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidObject`] if validation fails
    /// - [`StoreError::SystemFieldsSet`] if a store-managed field is set
    /// - [`StoreError::ReferencedNotExist`] if a reference target is missing
    /// - [`StoreError::KeyExists`] if the object already exists
    /// - [`StoreError::CasRetriesExhausted`] or [`StoreError::Timeout`] under sustained contention
    #[tracing::instrument(skip_all, fields(object = %object))]
    pub async fn create(&self, mut object: Object) -> StoreResult<Object> {
        object.canonicalize();
        let key = self.primary_key(&object);
        object.validate().map_err(|err| with_key(err, &key))?;

        let set = object.meta().system_fields_set();
        if !set.is_empty() {
            return Err(StoreError::SystemFieldsSet { key, fields: set });
        }

        let now = Utc::now();
        let meta = object.meta_mut();
        meta.creation_timestamp = Some(now);
        meta.managed_fields.time = Some(now);

        let payload = codec::encode(&object)?;
        let references = find_references(&object);
        let operation = with_cas_retry(self.config.cas_retry(), &key, || {
            self.try_create(&key, &object, &payload, &references)
        });
        let revision = with_deadline(self.config.operation_timeout(), operation).await?;

        object.meta_mut().set_counters(revision, revision, 1);
        Ok(object)
    }

    async fn try_create(
        &self,
        key: &str,
        object: &Object,
        payload: &[u8],
        references: &[Reference],
    ) -> StoreResult<i64> {
        let mut txn = self.backend.transaction().await?;
        txn.compare(Compare::Absent(key.as_bytes().to_vec()));
        for target in self.target_keys(object, references) {
            txn.compare(Compare::Exists(target.into_bytes()));
        }
        for edge in self.edge_keys(object, references) {
            txn.put(edge.into_bytes(), Vec::new());
        }
        txn.put(key.as_bytes().to_vec(), payload.to_vec());

        match txn.commit().await {
            Ok(revision) => Ok(revision),
            Err(StorageError::Conflict) => {
                let missing = self.missing_targets(object, references).await?;
                if !missing.is_empty() {
                    debug!(missing = missing.len(), "create refused: reference targets missing");
                    return Err(StoreError::ReferencedNotExist { key: key.to_owned(), missing });
                }
                if self.backend.get(key.as_bytes()).await?.is_some() {
                    debug!("create refused: key exists");
                    return Err(StoreError::key_exists(key));
                }
                Err(StoreError::conflict(key))
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Replaces the stored object with `object`.
    ///
    /// Store-managed fields in `object` are ignored and taken from the
    /// stored copy. Returns `None` when nothing but store-managed fields
    /// differ; no write happens then and the revision does not move.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidObject`] if validation fails
    /// - [`StoreError::KeyNotFound`] if the object does not exist
    /// - [`StoreError::ReferencedNotExist`] if a reference target is missing
    /// - [`StoreError::CasRetriesExhausted`] or [`StoreError::Timeout`] under sustained contention
    #[tracing::instrument(skip_all, fields(object = %object))]
    pub async fn update(&self, mut object: Object) -> StoreResult<Option<Object>> {
        object.canonicalize();
        let key = self.primary_key(&object);
        object.validate().map_err(|err| with_key(err, &key))?;

        let references = find_references(&object);
        let operation = with_cas_retry(self.config.cas_retry(), &key, || {
            self.try_update(&key, &object, &references)
        });
        with_deadline(self.config.operation_timeout(), operation).await
    }

    async fn try_update(
        &self,
        key: &str,
        object: &Object,
        references: &[Reference],
    ) -> StoreResult<Option<Object>> {
        let Some(kv) = self.backend.get(key.as_bytes()).await? else {
            return Err(StoreError::key_not_found(key));
        };
        let current = decode(&kv)?;

        let mut next = object.clone();
        next.meta_mut().adopt_system_fields(current.meta());
        if next == current {
            debug!(revision = kv.mod_revision, "no change");
            return Ok(None);
        }
        next.meta_mut().managed_fields.time = Some(Utc::now());

        let mut stored = next.clone();
        stored.meta_mut().clear_counters();
        let payload = codec::encode(&stored)?;

        let old_edges = self.edge_keys(&current, &find_references(&current));
        let new_edges = self.edge_keys(&next, references);

        let stale = old_edges.difference(&new_edges).cloned().collect();
        let release = self.releasable_edges(&current, stale).await?;

        let mut txn = self.backend.transaction().await?;
        txn.compare(Compare::ModRevision(key.as_bytes().to_vec(), kv.mod_revision));
        for target in self.target_keys(&next, references) {
            txn.compare(Compare::Exists(target.into_bytes()));
        }
        for guard in release.guards {
            txn.compare(guard);
        }
        txn.put(key.as_bytes().to_vec(), payload);
        for edge in release.edges {
            txn.delete(edge.into_bytes());
        }
        for edge in new_edges {
            txn.put(edge.into_bytes(), Vec::new());
        }

        match txn.commit().await {
            Ok(revision) => {
                next.meta_mut().set_counters(kv.create_revision, revision, kv.version + 1);
                Ok(Some(next))
            },
            Err(StorageError::Conflict) => {
                let missing = self.missing_targets(&next, references).await?;
                if !missing.is_empty() {
                    debug!(missing = missing.len(), "update refused: reference targets missing");
                    return Err(StoreError::ReferencedNotExist { key: key.to_owned(), missing });
                }
                Err(StoreError::conflict(key))
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes an object and the reference edges it holds.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnknownKind`] if `kind` does not resolve
    /// - [`StoreError::KeyNotFound`] if the object does not exist
    /// - [`StoreError::ResourceReferenced`] naming one referrer if anything references the object
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, kind: &str, name: &str, namespace: &str) -> StoreResult<()> {
        let kind = parse_kind(kind)?;
        let key = self.keys.object(kind, namespace, name);
        let operation =
            with_cas_retry(self.config.cas_retry(), &key, || self.try_delete(kind, name, &key));
        with_deadline(self.config.operation_timeout(), operation).await
    }

    async fn try_delete(&self, kind: Kind, name: &str, key: &str) -> StoreResult<()> {
        let Some(kv) = self.backend.get(key.as_bytes()).await? else {
            return Err(StoreError::key_not_found(key));
        };
        let current = decode(&kv)?;

        let back_edges = RangeRequest::prefix(self.keys.edges_to(kind, name)).keys_only().limit(1);
        if let Some(edge) = self.backend.range(back_edges).await?.kvs.first() {
            let (referrer_kind, referrer_name) = referrer_of(&edge.key);
            debug!(%referrer_kind, %referrer_name, "delete refused: referenced");
            return Err(StoreError::ResourceReferenced {
                key: key.to_owned(),
                referrer_kind,
                referrer_name,
            });
        }

        let own_edges = self.edge_keys(&current, &find_references(&current));
        let release = self.releasable_edges(&current, own_edges).await?;

        let mut txn = self.backend.transaction().await?;
        txn.compare(Compare::ModRevision(key.as_bytes().to_vec(), kv.mod_revision));
        for guard in release.guards {
            txn.compare(guard);
        }
        txn.delete(key.as_bytes().to_vec());
        for edge in release.edges {
            txn.delete(edge.into_bytes());
        }

        match txn.commit().await {
            Ok(_) => Ok(()),
            Err(StorageError::Conflict) => Err(StoreError::conflict(key)),
            Err(err) => Err(err.into()),
        }
    }

    /// Probes the backend.
    #[tracing::instrument(skip(self))]
    pub async fn health(&self) -> HealthStatus {
        self.backend.health_check(HealthProbe::Readiness).await
    }

    /// Returns `true` if the backend can serve requests.
    pub async fn is_healthy(&self) -> bool {
        self.health().await.is_serving()
    }

    fn primary_key(&self, object: &Object) -> String {
        self.keys.object(object.kind(), object.namespace(), object.name())
    }

    fn target_keys(&self, object: &Object, references: &[Reference]) -> BTreeSet<String> {
        references.iter().map(|r| self.keys.target(r, object.namespace())).collect()
    }

    fn edge_keys(&self, object: &Object, references: &[Reference]) -> BTreeSet<String> {
        references.iter().map(|r| self.keys.edge(r, object.kind(), object.name())).collect()
    }

    /// Narrows `candidates`, edges `object` is about to stop holding, to
    /// those no same-named object of its kind in another namespace still
    /// holds. The guards pin every such sibling and every released edge, so
    /// a sibling that starts or stops referencing in between turns the
    /// commit into a conflict.
    async fn releasable_edges(
        &self,
        object: &Object,
        candidates: BTreeSet<String>,
    ) -> StoreResult<EdgeRelease> {
        let mut release = EdgeRelease::default();
        if candidates.is_empty() {
            return Ok(release);
        }

        let mut held = BTreeSet::new();
        let kind = object.kind();
        if kind.is_namespaced() {
            let own = self.primary_key(object);
            let scope = RangeRequest::prefix(self.keys.scope(kind, None));
            let siblings = self.backend.range(scope).await?;
            for kv in &siblings.kvs {
                if kv.key.as_ref() == own.as_bytes() || name_of(&kv.key) != object.name() {
                    continue;
                }
                release.guards.push(Compare::ModRevision(kv.key.to_vec(), kv.mod_revision));
                let sibling = decode(kv)?;
                held.extend(self.edge_keys(&sibling, &find_references(&sibling)));
            }
        }

        for edge in candidates {
            if held.contains(&edge) {
                debug!(%edge, "edge still held by a sibling namespace");
                continue;
            }
            if let Some(kv) = self.backend.get(edge.as_bytes()).await? {
                let guard = Compare::ModRevision(edge.clone().into_bytes(), kv.mod_revision);
                release.guards.push(guard);
                release.edges.push(edge);
            }
        }
        Ok(release)
    }

    async fn missing_targets(
        &self,
        object: &Object,
        references: &[Reference],
    ) -> StoreResult<Vec<Reference>> {
        let mut missing = Vec::new();
        for reference in references {
            let target = self.keys.target(reference, object.namespace());
            if self.backend.get(target.as_bytes()).await?.is_none() {
                missing.push(reference.clone());
            }
        }
        Ok(missing)
    }
}

/// Edges a transaction may delete and the guards that keep that safe.
#[derive(Debug, Default)]
struct EdgeRelease {
    edges: Vec<String>,
    guards: Vec<Compare>,
}

fn parse_kind(kind: &str) -> StoreResult<Kind> {
    kind.parse::<Kind>().map_err(StoreError::from)
}

/// Decodes a stored record and attaches the backend's counters.
fn decode(kv: &KeyValue) -> StoreResult<Object> {
    let mut object = codec::decode(&kv.value).map_err(|err| match err {
        ResourceError::Schema { message, source } => StoreError::Schema {
            message: format!("{}: {message}", String::from_utf8_lossy(&kv.key)),
            source,
        },
        other => other.into(),
    })?;
    object.meta_mut().set_counters(kv.create_revision, kv.mod_revision, kv.version);
    Ok(object)
}

fn with_key(err: ResourceError, key: &str) -> StoreError {
    match err {
        ResourceError::Invalid(errors) => StoreError::InvalidObject { key: key.to_owned(), errors },
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use cmdb_resource::testutil::fixture;
    use cmdb_storage::MemoryBackend;

    use super::*;

    fn store() -> Store<MemoryBackend> {
        Store::new(MemoryBackend::new(), StoreConfig::default())
    }

    #[tokio::test]
    async fn payload_excludes_counters() {
        let store = store();
        store.create(fixture(Kind::Secret)).await.unwrap();
        let secret = fixture(Kind::Secret);
        let mut changed = secret.clone();
        changed.meta_mut().labels.insert("rotated".into(), "yes".into());
        store.update(changed).await.unwrap().expect("changed");

        let kv = store.backend().get(b"/registry/secrets/test").await.unwrap().unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&kv.value).unwrap();
        let meta = &raw["metadata"];
        assert!(meta.get("revision").is_none());
        assert!(meta.get("createRevision").is_none());
        assert!(meta.get("version").is_none());
        assert!(meta.get("creationTimestamp").is_some());
        assert!(meta["managedFields"].get("time").is_some());
    }

    #[tokio::test]
    async fn create_reports_backend_counters() {
        let store = store();
        let created = store.create(fixture(Kind::Secret)).await.unwrap();
        let read = store
            .get("secret", "test", "", &GetOptions::default())
            .await
            .unwrap()
            .expect("stored");
        assert_eq!(created, read);
        assert_eq!(read.meta().version, 1);
        assert_eq!(read.meta().create_revision, read.meta().revision);
    }

    #[tokio::test]
    async fn undecodable_record_names_its_key() {
        let store = store();
        store.backend().put(b"/registry/secrets/bad".to_vec(), b"{\"kind\":".to_vec()).await.unwrap();
        let err = store.get("Secret", "bad", "", &GetOptions::default()).await.unwrap_err();
        assert!(matches!(&err, StoreError::Schema { message, .. } if message.starts_with("/registry/secrets/bad")));
    }
}
