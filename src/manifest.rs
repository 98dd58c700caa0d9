//! Builders for the desired state of each child of a `WebApp`. Every builder is a pure function
//! of the `WebApp` and the `OperatorConfig`, so calling one twice always produces the same
//! manifest. The manifests returned here never carry owner references; those are attached by
//! `ownership::attach_ownership` right before a manifest is written.
mod configmap;
mod deployment;
mod ingress;
mod service;

pub use self::configmap::{build_configmap, CONFIGMAP_SUFFIX};
pub use self::deployment::{build_deployment, CONTAINER_NAME, CONTAINER_PORT};
pub use self::ingress::{build_ingress, rewrite_target_annotations, TLS_SECRET_SUFFIX};
pub use self::service::{build_service, SERVICE_PORT};

use crate::config::OperatorConfig;
use crate::resource::ObjectId;
use crate::webapp::WebApp;

use serde_json::{json, Value};

/// The label used to select the pods of a `WebApp`
pub const APP_LABEL: &str = "app";

/// Labels that are used as the pod selector. These must never change for the lifetime of a
/// `WebApp`, since a Deployment's selector is immutable.
pub fn selector_labels(webapp: &WebApp) -> Value {
    json!({
        APP_LABEL: webapp.name(),
    })
}

/// Labels added to the metadata of every child
pub fn common_labels(webapp: &WebApp, config: &OperatorConfig) -> Value {
    json!({
        APP_LABEL: webapp.name(),
        config.tracking_label_name.as_str(): webapp.name(),
        config.ownership_label_name.as_str(): config.operator_name.as_str(),
    })
}

/// id of the ConfigMap child of the given `WebApp`
pub fn configmap_id(webapp: &WebApp) -> ObjectId {
    webapp.id().with_suffix(CONFIGMAP_SUFFIX)
}

/// The Deployment, Service, and Ingress children all share the name of their parent
pub fn workload_id(webapp: &WebApp) -> ObjectId {
    webapp.id()
}

fn metadata(id: &ObjectId, labels: Value) -> Value {
    json!({
        "namespace": id.namespace.as_str(),
        "name": id.name.as_str(),
        "labels": labels,
    })
}


#[cfg(test)]
mod test {
    use super::test_support::webapp;
    use super::*;

    #[test]
    fn common_labels_include_the_selector_labels() {
        let config = OperatorConfig::new("test-operator");
        let webapp = webapp("demo");
        let labels = common_labels(&webapp, &config);
        let selector = selector_labels(&webapp);
        for (key, value) in selector.as_object().unwrap() {
            assert_eq!(Some(value), labels.get(key));
        }
        assert_eq!(Some("test-operator"), labels["app.kubernetes.io/managed-by"].as_str());
        assert_eq!(Some("demo"), labels["app.kubernetes.io/instance"].as_str());
    }

    #[test]
    fn child_ids_are_derived_from_the_parent() {
        let webapp = webapp("demo");
        assert_eq!(ObjectId::new("default", "demo-configmap"), configmap_id(&webapp));
        assert_eq!(ObjectId::new("default", "demo"), workload_id(&webapp));
    }
}
