use super::{Outcome, PassContext};
use crate::error::Error;
use crate::k8s_types::apps::v1::Deployment;
use crate::k8s_types::core::v1::{ConfigMap, Service};
use crate::k8s_types::networking_k8s_io::v1::Ingress;
use crate::k8s_types::K8sType;
use crate::manifest::CONFIGMAP_SUFFIX;
use crate::ownership::{has_finalizer, is_controlled_by, remove_finalizer};
use crate::resource::{K8sResource, ObjectId};
use crate::runner::client::ObjectStore;

use std::time::Instant;

/// Deletes every child explicitly, and only then removes our finalizer from the parent. The
/// children are deleted in the reverse of the order they're created in, so nothing is ever left
/// pointing at a child that's already gone. Deleting a child that doesn't exist is fine, so this
/// can be retried any number of times. A child that exists but is controlled by something else
/// is left alone, the same as when syncing.
pub(crate) async fn handle_finalize<S: ObjectStore>(
    ctx: &PassContext<'_, S>,
    parent: &K8sResource,
) -> Result<Outcome, Error> {
    let parent_id = parent.get_object_id().to_owned();
    let finalizer = ctx.config.finalizer_name.as_str();
    if !has_finalizer(parent.as_ref(), finalizer) {
        log::debug!(
            "Parent: {} is being deleted and our finalizer is already gone",
            parent_id
        );
        return Ok(Outcome::Finalized);
    }

    let start_time = Instant::now();
    // names are derived from the parent's id alone, so this works even if the spec can't be parsed
    let workload_id = parent_id.clone();
    let children: [(&'static K8sType, ObjectId); 4] = [
        (Ingress, workload_id.clone()),
        (Service, workload_id.clone()),
        (Deployment, workload_id),
        (ConfigMap, parent_id.with_suffix(CONFIGMAP_SUFFIX)),
    ];
    for (k8s_type, child_id) in children.iter() {
        let child_id = child_id.as_id_ref();
        if let Some(existing) = ctx.store.get(k8s_type, &child_id).await? {
            if !is_controlled_by(ctx.parent_type(), existing.as_ref(), parent.uid()) {
                log::warn!(
                    "{}: {} is not controlled by parent: {}, so it will not be deleted",
                    k8s_type.kind,
                    child_id,
                    parent_id
                );
                continue;
            }
        }
        log::debug!(
            "Deleting {}: {} of parent: {}",
            k8s_type.kind,
            child_id,
            parent_id
        );
        ctx.delete(k8s_type, &child_id).await?;
    }
    log::debug!(
        "Deleted all children of parent: {} in {}ms",
        parent_id,
        start_time.elapsed().as_millis()
    );

    let mut value = parent.clone().into_value();
    remove_finalizer(&mut value, finalizer);
    ctx.update(ctx.parent_type(), value).await?;
    log::info!(
        "Parent: {} has been finalized and '{}' was removed from its finalizers",
        parent_id,
        finalizer
    );
    Ok(Outcome::Finalized)
}
