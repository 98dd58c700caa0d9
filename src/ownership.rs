//! Parent/child ownership and the finalizer that gates deletion of the parent.
//!
//! Every child carries a controller owner reference back to its `WebApp`. The object store's
//! garbage collector uses it to cascade deletes, and the event source uses it (via `parent_of`)
//! to turn a change to a child into a reconcile request for the parent.
//!
//! The finalizer functions only change the given json value. Persisting the change is up to the
//! caller, and it's always done as a separate step of a reconciliation pass, since the write
//! changes the parent's resourceVersion.
use crate::error::Error;
use crate::k8s_types::K8sType;
use crate::resource::{InvalidResourceError, K8sResource, ObjectId, ResourceJson};

use serde_json::{json, Value};

/// Sets the controller owner reference of `child` to `parent`. Fails only if `parent` is not of
/// the `owner_type`, which means the operator has been misconfigured.
pub fn attach_ownership(
    owner_type: &K8sType,
    parent: &K8sResource,
    child: &mut Value,
) -> Result<(), Error> {
    if !owner_type.is_type(parent.api_version(), parent.kind()) {
        return Err(Error::UnresolvedOwnerType(format!(
            "{}/{}",
            parent.api_version(),
            parent.kind()
        )));
    }
    let new_ref = json!({
        "apiVersion": owner_type.api_version,
        "kind": owner_type.kind,
        "name": parent.name(),
        "uid": parent.uid(),
        "controller": true,
        "blockOwnerDeletion": true,
    });

    let meta = match child.pointer_mut("/metadata").and_then(Value::as_object_mut) {
        Some(meta) => meta,
        None => {
            let message = "child object is missing 'metadata'";
            return Err(InvalidResourceError::new(message, child.clone()).into());
        }
    };
    let owner_refs = meta
        .entry("ownerReferences")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !owner_refs.is_array() {
        *owner_refs = Value::Array(Vec::new());
    }
    if let Some(refs) = owner_refs.as_array_mut() {
        // there can only be one controller, so any other controller reference gets replaced
        refs.retain(|r| r.get("controller").and_then(Value::as_bool) != Some(true));
        refs.push(new_ref);
    }
    Ok(())
}

/// Returns the id of the parent that controls the given child, if the controller is of the
/// `owner_type`. Children are always in the same namespace as their parent.
pub fn parent_of(owner_type: &K8sType, child: &Value) -> Option<ObjectId> {
    let namespace = child.get_namespace().unwrap_or("");
    controller_ref(owner_type, child)
        .and_then(|r| r.get("name").and_then(Value::as_str))
        .map(|name| ObjectId::new(namespace, name))
}

/// Returns true if the child's controller owner reference points at the parent with the given uid
pub fn is_controlled_by(owner_type: &K8sType, child: &Value, parent_uid: &str) -> bool {
    controller_ref(owner_type, child)
        .and_then(|r| r.get("uid").and_then(Value::as_str))
        .map(|uid| uid == parent_uid)
        .unwrap_or(false)
}

fn controller_ref<'a>(owner_type: &K8sType, child: &'a Value) -> Option<&'a Value> {
    child
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)?
        .iter()
        .find(|r| {
            let is_controller = r.get("controller").and_then(Value::as_bool) == Some(true);
            let api_version = r.get("apiVersion").and_then(Value::as_str).unwrap_or("");
            let kind = r.get("kind").and_then(Value::as_str).unwrap_or("");
            is_controller && owner_type.is_type(api_version, kind)
        })
}

pub fn has_finalizer(resource: &Value, finalizer: &str) -> bool {
    resource
        .pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .map(|array| array.iter().any(|name| name.as_str() == Some(finalizer)))
        .unwrap_or(false)
}

/// Adds the finalizer if it's not already present. Returns true if the resource was changed,
/// which is never the case for a resource without `metadata`
pub fn add_finalizer(resource: &mut Value, finalizer: &str) -> bool {
    if has_finalizer(resource, finalizer) {
        return false;
    }
    let meta = match resource
        .pointer_mut("/metadata")
        .and_then(Value::as_object_mut)
    {
        Some(meta) => meta,
        None => return false,
    };
    let finalizers = meta
        .entry("finalizers")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !finalizers.is_array() {
        *finalizers = Value::Array(Vec::new());
    }
    match finalizers.as_array_mut() {
        Some(array) => {
            array.push(Value::String(finalizer.to_owned()));
            true
        }
        None => false,
    }
}

/// Removes every occurrence of the finalizer. Returns true if the resource was changed
pub fn remove_finalizer(resource: &mut Value, finalizer: &str) -> bool {
    match resource
        .pointer_mut("/metadata/finalizers")
        .and_then(Value::as_array_mut)
    {
        Some(array) => {
            let before = array.len();
            array.retain(|name| name.as_str() != Some(finalizer));
            array.len() != before
        }
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::k8s_types::webapp_crdlego_com::v1::WebApp;

    const FINALIZER: &str = "webapp.crdlego.com/finalizer";

    fn parent() -> K8sResource {
        K8sResource::from_value(json!({
            "apiVersion": "webapp.crdlego.com/v1",
            "kind": "WebApp",
            "metadata": {
                "namespace": "default",
                "name": "demo",
                "uid": "parent-uid",
                "resourceVersion": "1",
            }
        }))
        .unwrap()
    }

    fn child() -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "namespace": "default",
                "name": "demo-configmap",
            }
        })
    }

    #[test]
    fn attach_ownership_sets_a_single_controller_reference() {
        let mut child = child();
        attach_ownership(WebApp, &parent(), &mut child).unwrap();
        attach_ownership(WebApp, &parent(), &mut child).unwrap();

        let refs = child.pointer("/metadata/ownerReferences").unwrap();
        assert_eq!(
            &json!([{
                "apiVersion": "webapp.crdlego.com/v1",
                "kind": "WebApp",
                "name": "demo",
                "uid": "parent-uid",
                "controller": true,
                "blockOwnerDeletion": true,
            }]),
            refs
        );
        assert!(is_controlled_by(WebApp, &child, "parent-uid"));
        assert!(!is_controlled_by(WebApp, &child, "other-uid"));
    }

    #[test]
    fn attach_ownership_fails_for_an_unknown_owner_type() {
        let other = K8sResource::from_value(json!({
            "apiVersion": "example.com/v1",
            "kind": "Widget",
            "metadata": { "name": "w", "uid": "u", "resourceVersion": "1" }
        }))
        .unwrap();
        let mut child = child();
        match attach_ownership(WebApp, &other, &mut child) {
            Err(Error::UnresolvedOwnerType(kind)) => assert_eq!("example.com/v1/Widget", kind),
            other => panic!("expected UnresolvedOwnerType, got: {:?}", other),
        }
        assert!(child.pointer("/metadata/ownerReferences").is_none());
    }

    #[test]
    fn parent_of_routes_child_events_to_the_owner() {
        let mut child = child();
        assert_eq!(None, parent_of(WebApp, &child));
        attach_ownership(WebApp, &parent(), &mut child).unwrap();
        assert_eq!(Some(ObjectId::new("default", "demo")), parent_of(WebApp, &child));
    }

    #[test]
    fn parent_of_ignores_non_controller_references() {
        let child = json!({
            "metadata": {
                "namespace": "default",
                "name": "x",
                "ownerReferences": [{
                    "apiVersion": "webapp.crdlego.com/v1",
                    "kind": "WebApp",
                    "name": "demo",
                    "uid": "parent-uid",
                }]
            }
        });
        assert_eq!(None, parent_of(WebApp, &child));
    }

    #[test]
    fn finalizers_behave_like_a_set() {
        let mut value = parent().into_value();
        assert!(!has_finalizer(&value, FINALIZER));

        assert!(add_finalizer(&mut value, FINALIZER));
        assert!(!add_finalizer(&mut value, FINALIZER));
        assert!(has_finalizer(&value, FINALIZER));
        assert_eq!(&json!([FINALIZER]), value.pointer("/metadata/finalizers").unwrap());

        assert!(remove_finalizer(&mut value, FINALIZER));
        assert!(!remove_finalizer(&mut value, FINALIZER));
        assert!(!has_finalizer(&value, FINALIZER));
    }

    #[test]
    fn remove_finalizer_keeps_other_tokens() {
        let mut value = parent().into_value();
        add_finalizer(&mut value, "other.io/cleanup");
        add_finalizer(&mut value, FINALIZER);
        remove_finalizer(&mut value, FINALIZER);
        assert_eq!(
            &json!(["other.io/cleanup"]),
            value.pointer("/metadata/finalizers").unwrap()
        );
    }
}
