use super::{common_labels, metadata, selector_labels, workload_id};
use crate::config::OperatorConfig;
use crate::k8s_types::core::v1::Service;
use crate::manifest::CONTAINER_PORT;
use crate::webapp::WebApp;

use serde_json::{json, Value};

pub const SERVICE_PORT: i32 = 80;

/// The Service is exposed on a port of every node unless traffic will arrive through an Ingress,
/// in which case a cluster-internal address is all that's needed.
pub fn build_service(webapp: &WebApp, config: &OperatorConfig) -> Value {
    let id = workload_id(webapp);
    let service_type = if webapp.spec.enabled_ingress().is_some() {
        "ClusterIP"
    } else {
        "NodePort"
    };
    json!({
        "apiVersion": Service.api_version,
        "kind": Service.kind,
        "metadata": metadata(&id, common_labels(webapp, config)),
        "spec": {
            "type": service_type,
            "selector": selector_labels(webapp),
            "ports": [
                {
                    "port": SERVICE_PORT,
                    "protocol": "TCP",
                    "targetPort": CONTAINER_PORT,
                }
            ]
        }
    })
}
