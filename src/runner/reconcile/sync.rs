use super::{update_status_if_different, Outcome, PassContext};
use crate::config::IngressController;
use crate::error::Error;
use crate::fingerprint::CONFIG_HASH_ANNOTATION;
use crate::k8s_types::apps::v1::Deployment;
use crate::k8s_types::core::v1::{ConfigMap, Service};
use crate::k8s_types::networking_k8s_io::v1::Ingress;
use crate::k8s_types::K8sType;
use crate::manifest::{
    build_configmap, build_deployment, build_ingress, build_service, configmap_id, workload_id,
    CONTAINER_NAME,
};
use crate::ownership::{add_finalizer, attach_ownership, is_controlled_by};
use crate::resource::{InvalidResourceError, K8sResource, ObjectId, ResourceJson};
use crate::runner::client::ObjectStore;
use crate::runner::reconcile::compare::compare_values;
use crate::webapp::WebApp;

use serde_json::{json, Value};

use std::time::Instant;

/// Adds our finalizer to the parent, and that's all. Adding the finalizer changes the
/// resourceVersion of the parent, so any status update made in the same pass would conflict.
/// The write itself causes another pass, which will see the finalizer and sync the children.
pub(crate) async fn add_finalizer_to_parent<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: K8sResource,
) -> Result<(), Error> {
    let parent_id = parent.get_object_id().to_owned();
    let finalizer = ctx.config.finalizer_name.as_str();
    let mut value = parent.into_value();
    if !add_finalizer(&mut value, finalizer) {
        log::debug!("Parent: {} already has finalizer: '{}'", parent_id, finalizer);
        return Ok(());
    }
    ctx.update(ctx.parent_type(), value).await?;
    log::info!(
        "Observed new parent: {} and added '{}' as a finalizer",
        parent_id,
        finalizer
    );
    Ok(())
}

/// Syncs every child, in order, then propagates the status. Any error aborts the remaining steps.
pub(crate) async fn handle_sync<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: &K8sResource,
) -> Result<Outcome, Error> {
    let start_time = Instant::now();
    let webapp = WebApp::from_resource(parent)?;
    let parent_id = webapp.id();

    // The Deployment's environment references the ConfigMap, so the ConfigMap must come first.
    // The Service and Ingress only route to the Deployment's pods by label, so their order
    // only matters for keeping the writes of each pass predictable.
    sync_configmap(ctx, parent, &webapp).await?;
    sync_deployment(ctx, parent, &webapp).await?;
    sync_service(ctx, parent, &webapp).await?;
    sync_ingress(ctx, parent, &webapp).await?;
    log::debug!(
        "Synced all children of parent: {} in {}ms",
        parent_id,
        start_time.elapsed().as_millis()
    );

    let status_updated = update_status_if_different(ctx, parent, &webapp).await?;
    log::info!(
        "Finished sync for parent: {} in {}ms",
        parent_id,
        start_time.elapsed().as_millis()
    );
    Ok(Outcome::Synced { status_updated })
}

async fn sync_configmap<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: &K8sResource,
    webapp: &WebApp,
) -> Result<(), Error> {
    let desired = build_configmap(webapp, ctx.config);
    let id = configmap_id(webapp);
    match ctx.store.get(ConfigMap, &id.as_id_ref()).await? {
        None => create_child(ctx, parent, ConfigMap, desired).await,
        Some(existing) => match configmap_drift(&existing, &desired) {
            Some(reason) => {
                replace_child(ctx, parent, ConfigMap, &existing, desired, &reason).await
            }
            None => {
                log_no_change(parent, ConfigMap, &id);
                Ok(())
            }
        },
    }
}

async fn sync_deployment<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: &K8sResource,
    webapp: &WebApp,
) -> Result<(), Error> {
    let mut desired = build_deployment(webapp, ctx.config);
    let id = workload_id(webapp);
    match ctx.store.get(Deployment, &id.as_id_ref()).await? {
        None => create_child(ctx, parent, Deployment, desired).await,
        Some(existing) => match deployment_drift(&existing, &desired) {
            Some(reason) => {
                // an unset replica count means we don't manage it, so whatever is there is kept
                if desired.pointer("/spec/replicas").is_none() {
                    if let Some(replicas) = existing.pointer("/spec/replicas") {
                        desired["spec"]["replicas"] = replicas.clone();
                    }
                }
                replace_child(ctx, parent, Deployment, &existing, desired, &reason).await
            }
            None => {
                log_no_change(parent, Deployment, &id);
                Ok(())
            }
        },
    }
}

/// The Service is created once and then left alone
async fn sync_service<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: &K8sResource,
    webapp: &WebApp,
) -> Result<(), Error> {
    let id = workload_id(webapp);
    match ctx.store.get(Service, &id.as_id_ref()).await? {
        None => create_child(ctx, parent, Service, build_service(webapp, ctx.config)).await,
        Some(_) => {
            log_no_change(parent, Service, &id);
            Ok(())
        }
    }
}

async fn sync_ingress<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: &K8sResource,
    webapp: &WebApp,
) -> Result<(), Error> {
    let id = workload_id(webapp);
    let controller = &ctx.config.ingress_controller;
    let existing = ctx.store.get(Ingress, &id.as_id_ref()).await?;
    match (build_ingress(webapp, ctx.config), existing) {
        (Some(desired), None) => create_child(ctx, parent, Ingress, desired).await,
        (Some(desired), Some(existing)) => match ingress_drift(&existing, &desired, controller) {
            Some(reason) => replace_child(ctx, parent, Ingress, &existing, desired, &reason).await,
            None => {
                log_no_change(parent, Ingress, &id);
                Ok(())
            }
        },
        (None, Some(existing)) => {
            if !is_controlled_by(ctx.parent_type(), existing.as_ref(), parent.uid()) {
                log::warn!(
                    "Ingress: {} is not controlled by parent: {}, so it will not be deleted",
                    id,
                    parent.get_object_id()
                );
                Ok(())
            } else if existing.is_deletion_timestamp_set() {
                log::debug!("Ingress: {} is already being deleted", id);
                Ok(())
            } else {
                log::info!(
                    "Deleting Ingress: {} because ingress is disabled for parent: {}",
                    id,
                    parent.get_object_id()
                );
                ctx.delete(Ingress, &id.as_id_ref()).await
            }
        }
        (None, None) => {
            log::debug!(
                "Ingress is disabled for parent: {} and none exists",
                parent.get_object_id()
            );
            Ok(())
        }
    }
}

async fn create_child<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: &K8sResource,
    k8s_type: &'static K8sType,
    mut desired: Value,
) -> Result<(), Error> {
    attach_ownership(ctx.parent_type(), parent, &mut desired)?;
    let child_id = child_id(&desired)?;
    log::info!(
        "Creating {}: {} for parent: {}",
        k8s_type.kind,
        child_id,
        parent.get_object_id()
    );
    ctx.create(k8s_type, desired).await?;
    Ok(())
}

/// Replaces the existing child with the desired one. The write carries the resourceVersion of
/// the existing child, so that it fails with a conflict if someone else changed it since.
async fn replace_child<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: &K8sResource,
    k8s_type: &'static K8sType,
    existing: &K8sResource,
    mut desired: Value,
    reason: &str,
) -> Result<(), Error> {
    let child_id = child_id(&desired)?;
    if existing.is_deletion_timestamp_set() {
        log::debug!(
            "Will skip updating {}: {} on this pass because it is currently being deleted",
            k8s_type.kind,
            child_id
        );
        return Ok(());
    }
    log::info!(
        "Updating {}: {} of parent: {} because {}",
        k8s_type.kind,
        child_id,
        parent.get_object_id(),
        reason
    );
    attach_ownership(ctx.parent_type(), parent, &mut desired)?;
    if let Some(meta) = desired.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.insert(
            "resourceVersion".to_owned(),
            Value::String(existing.resource_version().to_owned()),
        );
    }
    ctx.update(k8s_type, desired).await?;
    Ok(())
}

fn child_id(desired: &Value) -> Result<ObjectId, Error> {
    desired
        .get_id_ref()
        .map(|id| id.to_owned())
        .ok_or_else(|| InvalidResourceError::new("missing name", desired.clone()).into())
}

fn log_no_change(parent: &K8sResource, k8s_type: &K8sType, id: &ObjectId) {
    log::debug!(
        "No difference in child of parent: {}, with type: {} and id: {}",
        parent.get_object_id(),
        k8s_type,
        id
    );
}

/// The ConfigMap has drifted if its data is different in any way, including extra keys
fn configmap_drift(existing: &K8sResource, desired: &Value) -> Option<String> {
    let empty = json!({});
    let existing_data = existing
        .get("data")
        .filter(|data| !data.is_null())
        .unwrap_or(&empty);
    let desired_data = desired.get("data").unwrap_or(&empty);
    if existing_data != desired_data {
        Some(format!(
            "data changed from {} to {}",
            existing_data, desired_data
        ))
    } else {
        None
    }
}

/// Only the few fields that the `WebApp` controls are compared. Configuration changes show up
/// as a change to the fingerprint annotation, so the ConfigMap never needs to be read here.
fn deployment_drift(existing: &K8sResource, desired: &Value) -> Option<String> {
    let existing_hash = template_annotation(existing.as_ref(), CONFIG_HASH_ANNOTATION);
    let desired_hash = template_annotation(desired, CONFIG_HASH_ANNOTATION);
    if existing_hash != desired_hash {
        return Some(format!(
            "config hash changed from {:?} to {:?}",
            existing_hash, desired_hash
        ));
    }

    let existing_image = container_image(existing.as_ref());
    let desired_image = container_image(desired);
    if existing_image != desired_image {
        return Some(format!(
            "image changed from {:?} to {:?}",
            existing_image, desired_image
        ));
    }

    if let Some(desired_replicas) = desired.pointer("/spec/replicas") {
        let existing_replicas = existing.pointer("/spec/replicas");
        if existing_replicas != Some(desired_replicas) {
            return Some(format!(
                "replicas changed from {:?} to {}",
                existing_replicas, desired_replicas
            ));
        }
    }
    None
}

/// The Ingress is owned outright, so its spec must match exactly. For the metadata, only the
/// labels we set and the rewrite annotation are ours, and anything else added by others is
/// ignored. The rewrite annotation is checked even when it's no longer desired, so that it gets
/// removed after the class name changes.
fn ingress_drift(
    existing: &K8sResource,
    desired: &Value,
    controller: &IngressController,
) -> Option<String> {
    let null = Value::Null;
    let existing_spec = existing.get("spec").unwrap_or(&null);
    let desired_spec = desired.get("spec").unwrap_or(&null);
    if existing_spec != desired_spec {
        return Some(format!(
            "spec changed from {} to {}",
            existing_spec, desired_spec
        ));
    }

    let empty = json!({});
    let desired_labels = desired.pointer("/metadata/labels").unwrap_or(&empty);
    let existing_labels = existing.pointer("/metadata/labels").unwrap_or(&empty);
    let diffs = compare_values(existing_labels, desired_labels);
    if diffs.non_empty() {
        return Some(format!("labels changed: {}", diffs));
    }

    let mut owned_annotations = vec![controller.rewrite_target_annotation.as_str()];
    let desired_annotations = desired
        .pointer("/metadata/annotations")
        .and_then(Value::as_object);
    if let Some(annotations) = desired_annotations {
        owned_annotations.extend(annotations.keys().map(String::as_str));
    }
    for annotation in owned_annotations {
        let existing_value = existing.get_annotation_value(annotation);
        let desired_value = desired_annotations
            .and_then(|annotations| annotations.get(annotation))
            .and_then(Value::as_str);
        if existing_value != desired_value {
            return Some(format!(
                "annotation '{}' changed from {:?} to {:?}",
                annotation, existing_value, desired_value
            ));
        }
    }
    None
}

fn template_annotation<'a>(deployment: &'a Value, annotation: &str) -> Option<&'a str> {
    deployment
        .pointer("/spec/template/metadata/annotations")
        .and_then(|annotations| annotations.get(annotation))
        .and_then(Value::as_str)
}

fn container_image(deployment: &Value) -> Option<&str> {
    deployment
        .pointer("/spec/template/spec/containers")
        .and_then(Value::as_array)?
        .iter()
        .find(|c| c.get("name").and_then(Value::as_str) == Some(CONTAINER_NAME))
        .and_then(|c| c.get("image"))
        .and_then(Value::as_str)
}
