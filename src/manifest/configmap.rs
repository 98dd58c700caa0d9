use super::{common_labels, configmap_id, metadata};
use crate::config::OperatorConfig;
use crate::k8s_types::core::v1::ConfigMap;
use crate::webapp::WebApp;

use serde_json::{json, Value};

pub const CONFIGMAP_SUFFIX: &str = "-configmap";

/// The ConfigMap always exists, even when `configData` is empty, so that its lifecycle is the
/// same as every other child. An empty map produces an empty `data` object.
pub fn build_configmap(webapp: &WebApp, config: &OperatorConfig) -> Value {
    let id = configmap_id(webapp);
    json!({
        "apiVersion": ConfigMap.api_version,
        "kind": ConfigMap.kind,
        "metadata": metadata(&id, common_labels(webapp, config)),
        "data": &webapp.spec.config_data,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::manifest::test_support::{webapp, with_config};

    use k8s_openapi::api::core::v1::ConfigMap as TypedConfigMap;

    #[test]
    fn config_data_is_copied_verbatim() {
        let webapp = with_config(webapp("demo"), &[("LOG_LEVEL", "debug"), ("MODE", "a=b")]);
        let manifest = build_configmap(&webapp, &OperatorConfig::default());
        assert_eq!(json!({"LOG_LEVEL": "debug", "MODE": "a=b"}), manifest["data"]);
        assert_eq!(
            Some("demo-configmap"),
            manifest.pointer("/metadata/name").and_then(Value::as_str)
        );

        let typed: TypedConfigMap = serde_json::from_value(manifest).unwrap();
        assert_eq!(2, typed.data.unwrap().len());
    }

    #[test]
    fn empty_config_data_still_produces_a_configmap() {
        let manifest = build_configmap(&webapp("demo"), &OperatorConfig::default());
        assert_eq!(json!({}), manifest["data"]);
        assert_eq!("ConfigMap", manifest["kind"]);
    }
}
