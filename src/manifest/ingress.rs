use super::{common_labels, metadata, workload_id};
use crate::config::{IngressController, OperatorConfig};
use crate::k8s_types::networking_k8s_io::v1::Ingress;
use crate::resource::JsonObject;
use crate::webapp::{ResolvedIngress, WebApp};

use serde_json::{json, Value};

pub const TLS_SECRET_SUFFIX: &str = "-tls";

/// Returns the desired Ingress, or `None` if the `WebApp` should not have one
pub fn build_ingress(webapp: &WebApp, config: &OperatorConfig) -> Option<Value> {
    let ingress = webapp.spec.enabled_ingress()?;
    let id = workload_id(webapp);

    let mut meta = metadata(&id, common_labels(webapp, config));
    let annotations = rewrite_target_annotations(&ingress, &config.ingress_controller);
    if !annotations.is_empty() {
        meta["annotations"] = Value::Object(annotations);
    }

    let mut rule = json!({
        "http": {
            "paths": [
                {
                    "path": ingress.path.as_str(),
                    "pathType": "Prefix",
                    "backend": {
                        "service": {
                            "name": id.name.as_str(),
                            "port": {
                                "number": ingress.port,
                            }
                        }
                    }
                }
            ]
        }
    });
    if let Some(host) = ingress.host.as_ref() {
        rule["host"] = json!(host);
    }

    let mut spec = json!({
        "rules": [rule],
    });
    if let Some(class_name) = ingress.class_name.as_ref() {
        spec["ingressClassName"] = json!(class_name);
    }
    if ingress.tls {
        let hosts: Vec<&str> = ingress.host.iter().map(String::as_str).collect();
        spec["tls"] = json!([
            {
                "hosts": hosts,
                "secretName": id.with_suffix(TLS_SECRET_SUFFIX).name,
            }
        ]);
    }

    Some(json!({
        "apiVersion": Ingress.api_version,
        "kind": Ingress.kind,
        "metadata": meta,
        "spec": spec,
    }))
}

/// Returns the annotations that tell the ingress controller how to rewrite paths. These are only
/// known for the configured controller, so any other class name gets no annotations at all.
pub fn rewrite_target_annotations(
    ingress: &ResolvedIngress,
    controller: &IngressController,
) -> JsonObject {
    let mut annotations = JsonObject::new();
    if ingress.class_name.as_deref() == Some(controller.class_name.as_str()) {
        annotations.insert(
            controller.rewrite_target_annotation.clone(),
            Value::String(ingress.rewrite_target.clone()),
        );
    }
    annotations
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::manifest::test_support::{webapp, with_ingress};
    use crate::webapp::IngressSpec;

    use k8s_openapi::api::networking::v1::Ingress as TypedIngress;

    fn enabled() -> IngressSpec {
        IngressSpec {
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn no_ingress_is_built_unless_enabled() {
        let config = OperatorConfig::default();
        assert!(build_ingress(&webapp("demo"), &config).is_none());

        let disabled = IngressSpec {
            enabled: false,
            class_name: Some("nginx".to_owned()),
            host: Some("demo.example.com".to_owned()),
            tls: true,
            ..Default::default()
        };
        assert!(build_ingress(&with_ingress(webapp("demo"), disabled), &config).is_none());
    }

    #[test]
    fn defaults_route_everything_to_port_80() {
        let manifest =
            build_ingress(&with_ingress(webapp("demo"), enabled()), &OperatorConfig::default())
                .unwrap();
        let path = &manifest["spec"]["rules"][0]["http"]["paths"][0];
        assert_eq!("/", path["path"]);
        assert_eq!("Prefix", path["pathType"]);
        assert_eq!(json!({"name": "demo", "port": {"number": 80}}), path["backend"]["service"]);
        // no class name means the cluster default controller, and no annotations for it
        assert!(manifest.pointer("/spec/ingressClassName").is_none());
        assert!(manifest.pointer("/metadata/annotations").is_none());
        assert!(manifest.pointer("/spec/rules/0/host").is_none());
        assert!(manifest.pointer("/spec/tls").is_none());

        let typed: TypedIngress = serde_json::from_value(manifest).unwrap();
        assert_eq!(1, typed.spec.unwrap().rules.unwrap().len());
    }

    #[test]
    fn known_controller_gets_a_rewrite_target_annotation() {
        let ingress = IngressSpec {
            class_name: Some("nginx".to_owned()),
            ..enabled()
        };
        let manifest =
            build_ingress(&with_ingress(webapp("demo"), ingress), &OperatorConfig::default())
                .unwrap();
        assert_eq!("nginx", manifest["spec"]["ingressClassName"]);
        assert_eq!(
            json!({"nginx.ingress.kubernetes.io/rewrite-target": "/"}),
            manifest["metadata"]["annotations"]
        );
    }

    #[test]
    fn explicit_rewrite_target_is_used() {
        let ingress = IngressSpec {
            class_name: Some("nginx".to_owned()),
            rewrite_target: Some("/$2".to_owned()),
            ..enabled()
        }
        .resolve();
        let annotations = rewrite_target_annotations(&ingress, &IngressController::nginx());
        assert_eq!(
            Some(&json!("/$2")),
            annotations.get("nginx.ingress.kubernetes.io/rewrite-target")
        );
    }

    #[test]
    fn unknown_controller_gets_no_annotations() {
        let ingress = IngressSpec {
            class_name: Some("traefik".to_owned()),
            ..enabled()
        }
        .resolve();
        assert!(rewrite_target_annotations(&ingress, &IngressController::nginx()).is_empty());
    }

    #[test]
    fn tls_binds_the_host_to_a_per_parent_secret() {
        let ingress = IngressSpec {
            host: Some("demo.example.com".to_owned()),
            path: Some("/app".to_owned()),
            port: Some(8080),
            tls: true,
            ..enabled()
        };
        let manifest =
            build_ingress(&with_ingress(webapp("demo"), ingress), &OperatorConfig::default())
                .unwrap();
        assert_eq!(
            json!([{"hosts": ["demo.example.com"], "secretName": "demo-tls"}]),
            manifest["spec"]["tls"]
        );
        assert_eq!("demo.example.com", manifest["spec"]["rules"][0]["host"]);
        assert_eq!("/app", manifest["spec"]["rules"][0]["http"]["paths"][0]["path"]);
        assert_eq!(
            json!(8080),
            manifest["spec"]["rules"][0]["http"]["paths"][0]["backend"]["service"]["port"]["number"]
        );
    }
}
