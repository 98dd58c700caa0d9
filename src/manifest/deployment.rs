use super::{common_labels, configmap_id, metadata, selector_labels, workload_id};
use crate::config::OperatorConfig;
use crate::fingerprint::{fingerprint, CONFIG_HASH_ANNOTATION};
use crate::k8s_types::apps::v1::Deployment;
use crate::webapp::WebApp;

use serde_json::{json, Value};

pub const CONTAINER_NAME: &str = "webapp";
pub const CONTAINER_PORT: i32 = 80;

pub fn build_deployment(webapp: &WebApp, config: &OperatorConfig) -> Value {
    let id = workload_id(webapp);
    let mut container = json!({
        "name": CONTAINER_NAME,
        "image": webapp.spec.image.as_str(),
        "ports": [
            { "containerPort": CONTAINER_PORT }
        ],
    });
    // the environment only ever references the ConfigMap, the data itself is never inlined
    if !webapp.spec.config_data.is_empty() {
        container["envFrom"] = json!([
            {
                "configMapRef": {
                    "name": configmap_id(webapp).name,
                }
            }
        ]);
    }

    let mut spec = json!({
        "selector": {
            "matchLabels": selector_labels(webapp),
        },
        "template": {
            "metadata": {
                "labels": selector_labels(webapp),
                "annotations": {
                    CONFIG_HASH_ANNOTATION: fingerprint(&webapp.spec.config_data),
                },
            },
            "spec": {
                "containers": [container],
            },
        },
    });
    // an unset replica count is left out entirely, so that it's never overwritten
    if let Some(replicas) = webapp.spec.replicas {
        spec["replicas"] = json!(replicas);
    }

    json!({
        "apiVersion": Deployment.api_version,
        "kind": Deployment.kind,
        "metadata": metadata(&id, common_labels(webapp, config)),
        "spec": spec,
    })
}
