pub(crate) mod compare;
mod finalize;
mod sync;

use crate::config::OperatorConfig;
use crate::error::Error;
use crate::k8s_types::apps::v1::Deployment;
use crate::k8s_types::K8sType;
use crate::manifest::workload_id;
use crate::resource::{K8sResource, ObjectIdRef};
use crate::runner::client::ObjectStore;
use crate::runner::metrics::{Metrics, WriteVerb};
use crate::webapp::WebApp;

use serde_json::{json, Value};

use std::convert::TryFrom;
use std::fmt::{self, Display};

/// The lifecycle phase of a parent, as determined from a single snapshot of it. Each pass
/// performs the action for exactly one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The parent doesn't exist, so there's nothing to do
    Absent,
    /// The parent has a deletion timestamp. Children are deleted, then the finalizer is removed
    Deleting,
    /// The parent doesn't have our finalizer yet
    Uninitialized,
    /// Children are synced and the status is propagated
    Steady,
}

impl Phase {
    pub fn of(parent: Option<&K8sResource>, finalizer_name: &str) -> Phase {
        match parent {
            None => Phase::Absent,
            Some(p) if p.is_deletion_timestamp_set() => Phase::Deleting,
            Some(p) if !p.finalizers().any(|f| f == finalizer_name) => Phase::Uninitialized,
            Some(_) => Phase::Steady,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Absent => "absent",
            Phase::Deleting => "deleting",
            Phase::Uninitialized => "uninitialized",
            Phase::Steady => "steady",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The parent doesn't exist
    NotFound,
    /// All children were deleted and the finalizer was removed, or it was already gone
    Finalized,
    /// The finalizer was added to the parent, and nothing else was done
    FinalizerAdded,
    /// All children are in their desired state
    Synced { status_updated: bool },
}

/// Everything a single pass needs. Nothing in here outlives the pass, except what the store holds.
pub(crate) struct PassContext<'a, S: ObjectStore> {
    pub store: &'a S,
    pub config: &'a OperatorConfig,
    pub metrics: &'a Metrics,
}

impl<'a, S: ObjectStore> PassContext<'a, S> {
    pub fn parent_type(&self) -> &'static K8sType {
        self.config.parent
    }

    pub async fn create(&self, k8s_type: &K8sType, resource: Value) -> Result<K8sResource, Error> {
        self.metrics.write_issued(k8s_type, WriteVerb::Create);
        self.store.create(k8s_type, resource).await
    }

    pub async fn update(&self, k8s_type: &K8sType, resource: Value) -> Result<K8sResource, Error> {
        self.metrics.write_issued(k8s_type, WriteVerb::Update);
        self.store.update(k8s_type, resource).await
    }

    pub async fn update_status(
        &self,
        k8s_type: &K8sType,
        resource: Value,
    ) -> Result<K8sResource, Error> {
        self.metrics.write_issued(k8s_type, WriteVerb::UpdateStatus);
        self.store.update_status(k8s_type, resource).await
    }

    pub async fn delete(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Result<(), Error> {
        self.metrics.write_issued(k8s_type, WriteVerb::Delete);
        self.store.delete(k8s_type, id).await
    }
}

/// Fetches a fresh snapshot of the parent and performs the action for its current phase
pub(crate) async fn run_pass<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent_id: &ObjectIdRef<'_>,
) -> Result<Outcome, Error> {
    let parent = ctx.store.get(ctx.parent_type(), parent_id).await?;
    let phase = Phase::of(parent.as_ref(), ctx.config.finalizer_name.as_str());
    ctx.metrics.pass_started(phase);
    log::debug!("Starting pass for parent: {} in phase: {}", parent_id, phase);

    let result = match parent {
        None => {
            log::debug!("Parent: {} does not exist, nothing to reconcile", parent_id);
            Ok(Outcome::NotFound)
        }
        Some(parent) => match phase {
            Phase::Deleting => self::finalize::handle_finalize(ctx, &parent).await,
            Phase::Uninitialized => self::sync::add_finalizer_to_parent(ctx, parent)
                .await
                .map(|_| Outcome::FinalizerAdded),
            _ => self::sync::handle_sync(ctx, &parent).await,
        },
    };
    if let Err(err) = result.as_ref() {
        ctx.metrics.pass_error(phase);
        log::error!(
            "Error in {} pass for parent: {}: {}",
            phase,
            parent_id,
            err
        );
    }
    result
}

/// Reads the available replica count from the Deployment and writes it to the status of the
/// parent, but only if it's different from what's there already. A Deployment that doesn't
/// exist, or that has no status yet, has zero available replicas. Returns true if a write was made.
pub(crate) async fn update_status_if_different<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: &K8sResource,
    webapp: &WebApp,
) -> Result<bool, Error> {
    let parent_id = parent.get_object_id();
    let deployment_id = workload_id(webapp);
    let deployment = ctx.store.get(Deployment, &deployment_id.as_id_ref()).await?;
    let observed = observed_available_replicas(deployment.as_ref());

    match webapp.available_replicas() {
        Some(current) if current == observed => {
            log::debug!(
                "Status of parent: {} already has availableReplicas: {}",
                parent_id,
                current
            );
            return Ok(false);
        }
        Some(current) => log::info!(
            "Updating availableReplicas of parent: {} from {} to {}",
            parent_id,
            current,
            observed
        ),
        None => log::info!(
            "Current status for parent: {} is null, setting availableReplicas: {}",
            parent_id,
            observed
        ),
    }

    // the whole parent is sent so that the write carries the resourceVersion we observed, but
    // the store only looks at the status
    let mut new_parent = parent.clone().into_value();
    if !new_parent.get("status").map(Value::is_object).unwrap_or(false) {
        new_parent["status"] = json!({});
    }
    new_parent["status"]["availableReplicas"] = json!(observed);
    ctx.update_status(ctx.parent_type(), new_parent).await?;
    Ok(true)
}

fn observed_available_replicas(deployment: Option<&K8sResource>) -> i32 {
    deployment
        .and_then(|d| d.pointer("/status/availableReplicas"))
        .and_then(Value::as_i64)
        .and_then(|count| i32::try_from(count).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::DEFAULT_FINALIZER_NAME;

    fn parent(metadata: Value) -> K8sResource {
        let mut value = json!({
            "apiVersion": "webapp.crdlego.com/v1",
            "kind": "WebApp",
            "metadata": {
                "namespace": "default",
                "name": "demo",
                "uid": "demo-uid",
                "resourceVersion": "1",
            },
            "spec": { "image": "nginx:1.25" }
        });
        if let (Some(meta), Some(extra)) = (
            value.get_mut("metadata").and_then(Value::as_object_mut),
            metadata.as_object(),
        ) {
            for (k, v) in extra {
                meta.insert(k.clone(), v.clone());
            }
        }
        K8sResource::from_value(value).unwrap()
    }

    #[test]
    fn phase_is_absent_without_a_parent() {
        assert_eq!(Phase::Absent, Phase::of(None, DEFAULT_FINALIZER_NAME));
    }

    #[test]
    fn phase_is_uninitialized_without_our_finalizer() {
        let p = parent(json!({}));
        assert_eq!(Phase::Uninitialized, Phase::of(Some(&p), DEFAULT_FINALIZER_NAME));

        let p = parent(json!({ "finalizers": ["someone.else/finalizer"] }));
        assert_eq!(Phase::Uninitialized, Phase::of(Some(&p), DEFAULT_FINALIZER_NAME));
    }

    #[test]
    fn phase_is_steady_with_our_finalizer() {
        let p = parent(json!({ "finalizers": [DEFAULT_FINALIZER_NAME] }));
        assert_eq!(Phase::Steady, Phase::of(Some(&p), DEFAULT_FINALIZER_NAME));
    }

    #[test]
    fn deletion_timestamp_takes_precedence_over_everything_else() {
        let p = parent(json!({
            "deletionTimestamp": "2025-01-01T00:00:00Z",
            "finalizers": [DEFAULT_FINALIZER_NAME],
        }));
        assert_eq!(Phase::Deleting, Phase::of(Some(&p), DEFAULT_FINALIZER_NAME));

        let p = parent(json!({ "deletionTimestamp": "2025-01-01T00:00:00Z" }));
        assert_eq!(Phase::Deleting, Phase::of(Some(&p), DEFAULT_FINALIZER_NAME));
    }

    #[test]
    fn null_deletion_timestamp_is_not_deleting() {
        let p = parent(json!({
            "deletionTimestamp": null,
            "finalizers": [DEFAULT_FINALIZER_NAME],
        }));
        assert_eq!(Phase::Steady, Phase::of(Some(&p), DEFAULT_FINALIZER_NAME));
    }

    #[test]
    fn missing_deployment_status_counts_as_zero_replicas() {
        assert_eq!(0, observed_available_replicas(None));
        let deployment = K8sResource::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "demo", "uid": "u", "resourceVersion": "3" },
        }))
        .unwrap();
        assert_eq!(0, observed_available_replicas(Some(&deployment)));

        let mut value = deployment.into_value();
        value["status"] = json!({ "availableReplicas": 2, "replicas": 3 });
        let deployment = K8sResource::from_value(value).unwrap();
        assert_eq!(2, observed_available_replicas(Some(&deployment)));
    }

    #[test]
    fn out_of_range_available_replicas_count_as_zero() {
        let deployment = K8sResource::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "demo", "uid": "u", "resourceVersion": "3" },
            "status": { "availableReplicas": 4_294_967_298u64 },
        }))
        .unwrap();
        assert_eq!(0, observed_available_replicas(Some(&deployment)));
    }
}
