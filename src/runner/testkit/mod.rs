//! Utilities for testing the reconciliation engine without a cluster. `MemoryStore` is an
//! `ObjectStore` that keeps everything in memory, but still enforces optimistic concurrency,
//! finalizers, and owner-based garbage collection. Every write it receives is recorded in a
//! journal, so tests can assert on exactly which writes a pass performed and in what order.
//!
//! `TestKit` wraps a `MemoryStore` and a `Reconciler` with a single threaded runtime, for tests
//! that don't want to be async.
//!
//! **This module is only available when the `testkit` feature is enabled in your Cargo.toml**
use crate::config::OperatorConfig;
use crate::error::Error;
use crate::k8s_types::K8sType;
use crate::resource::{K8sResource, ObjectId, ObjectIdRef, ResourceJson};
use crate::runner::client::ObjectStore;
use crate::runner::reconcile::compare::{compare_values, Diffs};
use crate::runner::metrics::Metrics;
use crate::runner::{Outcome, Reconciler};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::runtime::Runtime;

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// The in-memory store doesn't have a clock, so every deletion happens at the same instant
pub const DELETION_TIMESTAMP: &str = "2025-01-01T00:00:00Z";

pub trait ToJson {
    fn to_json(&self) -> Value;
    fn into_json(self) -> Value;
}

impl<T: Serialize + Clone> ToJson for T {
    fn to_json(&self) -> Value {
        self.clone().into_json()
    }
    fn into_json(self) -> Value {
        serde_json::to_value(self).expect("failed to serialize value")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Update,
    UpdateStatus,
    Delete,
}

/// A single write call that was received by the `MemoryStore`, whether or not it succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub verb: Verb,
    pub kind: &'static str,
    pub id: ObjectId,
}

impl Write {
    pub fn new(verb: Verb, kind: &'static str, namespace: &str, name: &str) -> Write {
        Write {
            verb,
            kind,
            id: ObjectId::new(namespace, name),
        }
    }
}

impl Display for Write {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} {} {}", self.verb, self.kind, self.id)
    }
}

/// The kinds of failure that can be injected into a `MemoryStore`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Conflict,
    Transient,
}

#[derive(Debug)]
struct InjectedFailure {
    verb: Option<Verb>,
    kind: &'static str,
    failure: Failure,
}

type Key = (&'static str, &'static str, ObjectId);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Key, Value>,
    last_version: u64,
    last_uid: u64,
    journal: Vec<Write>,
    failures: Vec<InjectedFailure>,
    latency: Option<Duration>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    fn next_uid(&mut self) -> String {
        self.last_uid += 1;
        format!("uid-{}", self.last_uid)
    }

    /// `verb` is `None` for reads
    fn take_failure(
        &mut self,
        verb: Option<Verb>,
        k8s_type: &K8sType,
        id: &ObjectIdRef<'_>,
    ) -> Result<(), Error> {
        let position = self
            .failures
            .iter()
            .position(|f| f.kind == k8s_type.kind && f.verb == verb);
        match position.map(|i| self.failures.remove(i)) {
            Some(injected) => {
                log::debug!(
                    "Injecting {:?} failure for {:?} {} {}",
                    injected.failure,
                    verb,
                    k8s_type,
                    id
                );
                Err(match injected.failure {
                    Failure::Conflict => Error::Conflict(id.to_string()),
                    Failure::Transient => Error::Transient(format!("injected failure for {}", id)),
                })
            }
            None => Ok(()),
        }
    }

    fn record(&mut self, verb: Verb, k8s_type: &K8sType, id: &ObjectIdRef<'_>) {
        self.journal.push(Write {
            verb,
            kind: k8s_type.kind,
            id: id.to_owned(),
        });
    }

    /// Removes the object and then everything that it owns, recursively
    fn purge(&mut self, key: &Key) {
        let removed = match self.objects.remove(key) {
            Some(removed) => removed,
            None => return,
        };
        let uid = removed.pointer("/metadata/uid").and_then(Value::as_str).unwrap_or("");
        log::debug!("Purged {}/{} {}", key.0, key.1, key.2);
        let dependents: Vec<Key> = self
            .objects
            .iter()
            .filter(|(_, value)| is_owned_by(value, uid))
            .map(|(k, _)| k.clone())
            .collect();
        for dependent in dependents {
            self.purge(&dependent);
        }
    }
}

fn is_owned_by(value: &Value, uid: &str) -> bool {
    value
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .map(|refs| refs.iter().any(|r| r.get("uid").and_then(Value::as_str) == Some(uid)))
        .unwrap_or(false)
}

fn has_finalizers(value: &Value) -> bool {
    value
        .pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .map(|f| !f.is_empty())
        .unwrap_or(false)
}

fn is_deleting(value: &Value) -> bool {
    value
        .pointer("/metadata/deletionTimestamp")
        .map(|v| !v.is_null())
        .unwrap_or(false)
}

fn key(k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Key {
    (k8s_type.api_version, k8s_type.kind, id.to_owned())
}

fn id_of(resource: &Value) -> Result<ObjectIdRef<'_>, Error> {
    resource.get_id_ref().ok_or_else(|| {
        crate::resource::InvalidResourceError::new("missing metadata.name", resource.clone()).into()
    })
}

fn set_meta(value: &mut Value, field: &str, new_value: Value) {
    if let Some(meta) = value.pointer_mut("/metadata").and_then(Value::as_object_mut) {
        meta.insert(field.to_owned(), new_value);
    }
}

/// An `ObjectStore` that holds everything in memory. Cloning it returns a handle to the same
/// underlying objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<Mutex<State>>);

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every store call will wait for the given duration before doing anything
    pub fn with_latency(self, latency: Duration) -> MemoryStore {
        self.state().latency = Some(latency);
        self
    }

    /// Causes the next write of the given verb to the given kind to fail
    pub fn fail_next(&self, verb: Verb, kind: &'static str, failure: Failure) {
        self.state().failures.push(InjectedFailure {
            verb: Some(verb),
            kind,
            failure,
        });
    }

    /// Causes the next `get` of the given kind to fail
    pub fn fail_next_get(&self, kind: &'static str, failure: Failure) {
        self.state().failures.push(InjectedFailure {
            verb: None,
            kind,
            failure,
        });
    }

    /// Returns all the writes received so far
    pub fn writes(&self) -> Vec<Write> {
        self.state().journal.clone()
    }

    /// Returns all the writes received so far, and clears the journal
    pub fn take_writes(&self) -> Vec<Write> {
        std::mem::replace(&mut self.state().journal, Vec::new())
    }

    /// Returns a copy of the stored object without going through the `ObjectStore` api
    pub fn get_value(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Option<Value> {
        self.state().objects.get(&key(k8s_type, id)).cloned()
    }

    pub fn count_of(&self, k8s_type: &K8sType) -> usize {
        self.state()
            .objects
            .keys()
            .filter(|(api_version, kind, _)| k8s_type.is_type(api_version, kind))
            .count()
    }

    /// Sets the status of an object without recording a write, like another controller would.
    /// Returns false if the object doesn't exist.
    pub fn set_status(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>, status: Value) -> bool {
        let mut state = self.state();
        let version = state.next_version();
        match state.objects.get_mut(&key(k8s_type, id)) {
            Some(existing) => {
                existing["status"] = status;
                set_meta(existing, "resourceVersion", Value::String(version));
                true
            }
            None => false,
        }
    }

    /// Replaces an object without checking or recording anything, like someone editing it by hand.
    /// The stored uid and resourceVersion are kept if `resource` doesn't set them.
    pub fn put_value(&self, k8s_type: &K8sType, mut resource: Value) -> Result<(), Error> {
        let id = id_of(&resource)?.to_owned();
        let mut state = self.state();
        let version = state.next_version();
        let k = key(k8s_type, &id.as_id_ref());
        let uid = match state.objects.get(&k).and_then(|v| v.pointer("/metadata/uid")).cloned() {
            Some(uid) => uid,
            None => Value::String(state.next_uid()),
        };
        if resource.pointer("/metadata/uid").is_none() {
            set_meta(&mut resource, "uid", uid);
        }
        set_meta(&mut resource, "resourceVersion", Value::String(version));
        state.objects.insert(k, resource);
        Ok(())
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        k8s_type: &K8sType,
        id: &ObjectIdRef<'_>,
    ) -> Result<Option<K8sResource>, Error> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.take_failure(None, k8s_type, id)?;
        match state.objects.get(&key(k8s_type, id)) {
            Some(value) => Ok(Some(K8sResource::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn create(&self, k8s_type: &K8sType, mut resource: Value) -> Result<K8sResource, Error> {
        self.simulate_latency().await;
        let id = id_of(&resource)?.to_owned();
        let id_ref = id.as_id_ref();
        let mut state = self.state();
        state.record(Verb::Create, k8s_type, &id_ref);
        state.take_failure(Some(Verb::Create), k8s_type, &id_ref)?;

        let k = key(k8s_type, &id_ref);
        if state.objects.contains_key(&k) {
            return Err(Error::AlreadyExists(id.to_string()));
        }
        let uid = state.next_uid();
        let version = state.next_version();
        set_meta(&mut resource, "uid", Value::String(uid));
        set_meta(&mut resource, "resourceVersion", Value::String(version));
        set_meta(&mut resource, "generation", json!(1));
        state.objects.insert(k, resource.clone());
        Ok(K8sResource::from_value(resource)?)
    }

    async fn update(&self, k8s_type: &K8sType, mut resource: Value) -> Result<K8sResource, Error> {
        self.simulate_latency().await;
        let id = id_of(&resource)?.to_owned();
        let id_ref = id.as_id_ref();
        let mut state = self.state();
        state.record(Verb::Update, k8s_type, &id_ref);
        state.take_failure(Some(Verb::Update), k8s_type, &id_ref)?;

        let k = key(k8s_type, &id_ref);
        let existing = state
            .objects
            .get(&k)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let expected = resource.pointer("/metadata/resourceVersion").and_then(Value::as_str);
        let current = existing.pointer("/metadata/resourceVersion").and_then(Value::as_str);
        if expected != current {
            return Err(Error::Conflict(id.to_string()));
        }

        // the status is never changed by a regular update, and neither is anything the store owns
        match existing.get("status") {
            Some(status) => resource["status"] = status.clone(),
            None => {
                if let Some(obj) = resource.as_object_mut() {
                    obj.remove("status");
                }
            }
        }
        for field in &["uid", "deletionTimestamp"] {
            match existing.pointer(&format!("/metadata/{}", field)) {
                Some(value) => set_meta(&mut resource, field, value.clone()),
                None => {
                    if let Some(meta) = resource
                        .pointer_mut("/metadata")
                        .and_then(Value::as_object_mut)
                    {
                        meta.remove(*field);
                    }
                }
            }
        }
        let generation = existing
            .pointer("/metadata/generation")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let version = state.next_version();
        set_meta(&mut resource, "resourceVersion", Value::String(version));
        set_meta(&mut resource, "generation", json!(generation + 1));

        if is_deleting(&resource) && !has_finalizers(&resource) {
            log::debug!("Last finalizer removed from {} {}, purging", k8s_type, id);
            state.objects.insert(k.clone(), resource.clone());
            state.purge(&k);
        } else {
            state.objects.insert(k, resource.clone());
        }
        Ok(K8sResource::from_value(resource)?)
    }

    async fn update_status(
        &self,
        k8s_type: &K8sType,
        resource: Value,
    ) -> Result<K8sResource, Error> {
        self.simulate_latency().await;
        let id = id_of(&resource)?.to_owned();
        let id_ref = id.as_id_ref();
        let mut state = self.state();
        state.record(Verb::UpdateStatus, k8s_type, &id_ref);
        state.take_failure(Some(Verb::UpdateStatus), k8s_type, &id_ref)?;

        let k = key(k8s_type, &id_ref);
        let mut existing = state
            .objects
            .get(&k)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let expected = resource.pointer("/metadata/resourceVersion").and_then(Value::as_str);
        let current = existing.pointer("/metadata/resourceVersion").and_then(Value::as_str);
        if expected != current {
            return Err(Error::Conflict(id.to_string()));
        }
        existing["status"] = resource.get("status").cloned().unwrap_or(Value::Null);
        let version = state.next_version();
        set_meta(&mut existing, "resourceVersion", Value::String(version));
        state.objects.insert(k, existing.clone());
        Ok(K8sResource::from_value(existing)?)
    }

    async fn delete(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Result<(), Error> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.record(Verb::Delete, k8s_type, id);
        state.take_failure(Some(Verb::Delete), k8s_type, id)?;

        let k = key(k8s_type, id);
        let has_pending_finalizers = match state.objects.get(&k) {
            Some(existing) => has_finalizers(existing),
            None => return Ok(()),
        };
        if has_pending_finalizers {
            let version = state.next_version();
            if let Some(existing) = state.objects.get_mut(&k) {
                if !is_deleting(existing) {
                    set_meta(existing, "deletionTimestamp", json!(DELETION_TIMESTAMP));
                    set_meta(existing, "resourceVersion", Value::String(version));
                }
            }
        } else {
            state.purge(&k);
        }
        Ok(())
    }
}

/// Drives a `Reconciler` backed by a `MemoryStore` from synchronous tests
pub struct TestKit {
    runtime: Runtime,
    reconciler: Reconciler<MemoryStore>,
}

impl fmt::Debug for TestKit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TestKit")
            .field("store", self.reconciler.store())
            .finish()
    }
}

impl TestKit {
    pub fn new(config: OperatorConfig) -> TestKit {
        TestKit::with_store(config, MemoryStore::new())
    }

    pub fn with_store(config: OperatorConfig, store: MemoryStore) -> TestKit {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("failed to create test runtime");
        TestKit {
            runtime,
            reconciler: Reconciler::new(
                store,
                config,
                Metrics::new().expect("failed to create metrics"),
            ),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        self.reconciler.store()
    }

    pub fn reconciler(&self) -> &Reconciler<MemoryStore> {
        &self.reconciler
    }

    pub fn metrics(&self) -> &Metrics {
        self.reconciler.metrics()
    }

    pub fn parent_type(&self) -> &'static K8sType {
        self.reconciler.config().parent
    }

    pub fn create_parent(&mut self, resource: impl ToJson) -> ObjectId {
        let parent_type = self.parent_type();
        let json = resource.into_json();
        let TestKit { ref runtime, ref reconciler } = *self;
        let created = runtime
            .block_on(reconciler.store().create(parent_type, json))
            .expect("Failed to create parent resource");
        created.get_object_id().to_owned()
    }

    /// Replaces the spec of the parent, as the author of the resource would
    pub fn update_parent_spec(&mut self, id: &ObjectIdRef<'_>, spec: impl ToJson) {
        let parent_type = self.parent_type();
        let TestKit { ref runtime, ref reconciler } = *self;
        let store = reconciler.store();
        let mut existing = runtime
            .block_on(store.get(parent_type, id))
            .expect("failed to get parent")
            .expect("parent does not exist")
            .into_value();
        existing["spec"] = spec.into_json();
        runtime
            .block_on(store.update(parent_type, existing))
            .expect("failed to update parent");
    }

    pub fn delete_parent(&mut self, id: &ObjectIdRef<'_>) {
        let parent_type = self.parent_type();
        let TestKit { ref runtime, ref reconciler } = *self;
        runtime
            .block_on(reconciler.store().delete(parent_type, id))
            .expect("failed to delete parent");
    }

    pub fn reconcile(&mut self, id: &ObjectIdRef<'_>) -> Result<Outcome, Error> {
        let TestKit { ref runtime, ref reconciler } = *self;
        runtime.block_on(reconciler.reconcile(id))
    }

    pub fn reconcile_and_assert_success(&mut self, id: &ObjectIdRef<'_>) -> Outcome {
        self.reconcile(id).expect("Reconciliation failed")
    }

    /// Runs passes until one of them performs no writes, which is what the event driven runtime
    /// would eventually do. Panics if that doesn't happen within `max_passes`.
    pub fn reconcile_until_stable(
        &mut self,
        id: &ObjectIdRef<'_>,
        max_passes: usize,
    ) -> Vec<Write> {
        let mut all_writes = Vec::new();
        for _ in 0..max_passes {
            let before = self.store().writes().len();
            self.reconcile_and_assert_success(id);
            let writes = self.store().writes();
            if writes.len() == before {
                return all_writes;
            }
            all_writes.extend_from_slice(&writes[before..]);
        }
        panic!(
            "Reconciliation of {} did not settle after {} passes, writes: {:?}",
            id, max_passes, all_writes
        );
    }

    pub fn get_resource(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Option<Value> {
        self.store().get_value(k8s_type, id)
    }

    /// Asserts that the stored resource contains every value in `expected`. Values that are only
    /// present in the stored resource are ignored.
    pub fn assert_resource_eq(
        &self,
        k8s_type: &K8sType,
        id: &ObjectIdRef<'_>,
        expected: impl ToJson,
    ) {
        let expected = expected.into_json();
        let actual = match self.get_resource(k8s_type, id) {
            Some(actual) => actual,
            None => panic!("No {} exists with id: {}", k8s_type, id),
        };
        let diffs: Diffs = compare_values(&actual, &expected);
        if diffs.non_empty() {
            panic!("Found diff in {}: {}\n{}", k8s_type, id, diffs);
        }
    }

    pub fn assert_resource_absent(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) {
        if let Some(actual) = self.get_resource(k8s_type, id) {
            panic!("Expected {} {} to be absent, but found: {:#}", k8s_type, id, actual);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::k8s_types::core::v1::ConfigMap;
    use crate::k8s_types::webapp_crdlego_com::v1::WebApp;

    fn parent(finalizers: Value) -> Value {
        json!({
            "apiVersion": "webapp.crdlego.com/v1",
            "kind": "WebApp",
            "metadata": { "namespace": "ns", "name": "demo", "finalizers": finalizers },
            "spec": { "image": "nginx:1.25" },
        })
    }

    fn child(name: &str, owner_uid: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "namespace": "ns",
                "name": name,
                "ownerReferences": [{
                    "kind": "WebApp",
                    "name": "demo",
                    "uid": owner_uid,
                    "controller": true,
                }],
            },
        })
    }

    #[tokio::test]
    async fn store_assigns_identity_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let created = store.create(WebApp, parent(json!([]))).await.unwrap();
        assert!(!created.uid().is_empty());
        assert!(!created.resource_version().is_empty());

        match store.create(WebApp, parent(json!([]))).await {
            Err(Error::AlreadyExists(_)) => {}
            other => panic!("expected AlreadyExists, got: {:?}", other),
        }
        let id = ObjectIdRef::new("ns", "demo");
        assert_eq!(Some(created), store.get(WebApp, &id).await.unwrap());
        assert_eq!(None, store.get(WebApp, &ObjectIdRef::new("ns", "other")).await.unwrap());
    }

    #[tokio::test]
    async fn update_with_a_stale_version_is_a_conflict() {
        let store = MemoryStore::new();
        let created = store.create(WebApp, parent(json!([]))).await.unwrap();
        let stale = created.clone().into_value();
        let mut fresh = created.into_value();
        fresh["spec"]["image"] = json!("nginx:1.27");
        store.update(WebApp, fresh).await.unwrap();

        match store.update(WebApp, stale).await {
            Err(Error::Conflict(_)) => {}
            other => panic!("expected Conflict, got: {:?}", other),
        }
        let writes = store.take_writes();
        assert_eq!(3, writes.len());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn status_and_spec_are_written_separately() {
        let store = MemoryStore::new();
        let created = store.create(WebApp, parent(json!([]))).await.unwrap();

        let mut with_status = created.into_value();
        with_status["status"] = json!({ "availableReplicas": 3 });
        with_status["spec"]["image"] = json!("ignored:latest");
        let updated = store.update_status(WebApp, with_status).await.unwrap();
        assert_eq!(json!({ "availableReplicas": 3 }), updated["status"]);
        assert_eq!(json!("nginx:1.25"), updated["spec"]["image"]);

        let mut without_status = updated.into_value();
        without_status["status"] = Value::Null;
        let updated = store.update(WebApp, without_status).await.unwrap();
        assert_eq!(json!({ "availableReplicas": 3 }), updated["status"]);
    }

    #[tokio::test]
    async fn delete_with_finalizers_only_marks_the_object() {
        let store = MemoryStore::new();
        store.create(WebApp, parent(json!(["example.com/cleanup"]))).await.unwrap();
        let id = ObjectIdRef::new("ns", "demo");

        store.delete(WebApp, &id).await.unwrap();
        let marked = store.get(WebApp, &id).await.unwrap().expect("parent was purged");
        assert!(marked.is_deletion_timestamp_set());

        let mut value = marked.into_value();
        value["metadata"]["finalizers"] = json!([]);
        store.update(WebApp, value).await.unwrap();
        assert_eq!(None, store.get(WebApp, &id).await.unwrap());
    }

    #[tokio::test]
    async fn purging_an_owner_cascades_to_its_dependents() {
        let store = MemoryStore::new();
        let owner = store.create(WebApp, parent(json!([]))).await.unwrap();
        store.create(ConfigMap, child("owned", owner.uid())).await.unwrap();
        store.create(ConfigMap, child("unrelated", "some-other-uid")).await.unwrap();

        store.delete(WebApp, &ObjectIdRef::new("ns", "demo")).await.unwrap();
        assert_eq!(0, store.count_of(WebApp));
        assert_eq!(None, store.get_value(ConfigMap, &ObjectIdRef::new("ns", "owned")));
        assert!(store.get_value(ConfigMap, &ObjectIdRef::new("ns", "unrelated")).is_some());

        // deleting something that isn't there is fine, but still recorded
        store.delete(WebApp, &ObjectIdRef::new("ns", "demo")).await.unwrap();
        assert_eq!(Verb::Delete, store.writes().last().unwrap().verb);
    }

    #[tokio::test]
    async fn injected_failures_apply_once() {
        let store = MemoryStore::new();
        store.fail_next(Verb::Create, "WebApp", Failure::Transient);
        match store.create(WebApp, parent(json!([]))).await {
            Err(Error::Transient(_)) => {}
            other => panic!("expected Transient, got: {:?}", other),
        }
        store.create(WebApp, parent(json!([]))).await.unwrap();

        store.fail_next_get("WebApp", Failure::Conflict);
        let id = ObjectIdRef::new("ns", "demo");
        assert!(store.get(WebApp, &id).await.unwrap_err().is_conflict());
        assert!(store.get(WebApp, &id).await.unwrap().is_some());
    }
}
