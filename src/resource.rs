mod json_ext;
mod object_id;

pub use self::json_ext::ResourceJson;
pub use self::object_id::{ObjectId, ObjectIdRef};

use serde_json::Value;

use std::ops::Deref;

pub type JsonObject = serde_json::Map<String, Value>;

#[derive(Debug, PartialEq, Clone)]
pub struct InvalidResourceError {
    pub message: &'static str,
    pub value: Value,
}

impl InvalidResourceError {
    pub fn new(message: &'static str, value: Value) -> Self {
        InvalidResourceError { message, value }
    }
}

impl std::fmt::Display for InvalidResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Invalid Resource: {}", self.message)
    }
}

impl std::error::Error for InvalidResourceError {}

/// A resource as it exists in the object store. The metadata that the store assigns
/// (`resourceVersion`, `uid`) is validated up front, so the accessors never fail.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct K8sResource(Value);

impl K8sResource {
    pub fn from_value(value: Value) -> Result<K8sResource, InvalidResourceError> {
        if let Err(msg) = K8sResource::validate(&value) {
            Err(InvalidResourceError {
                message: msg,
                value,
            })
        } else {
            Ok(K8sResource(value))
        }
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn resource_version(&self) -> &str {
        self.str_value("/metadata/resourceVersion").unwrap_or("")
    }

    pub fn get_annotation_value(&self, annotation: &str) -> Option<&str> {
        let annotations = self.0.pointer("/metadata/annotations")?.as_object()?;
        annotations.get(annotation).and_then(Value::as_str)
    }

    pub fn uid(&self) -> &str {
        self.str_value("/metadata/uid").unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.str_value("/metadata/name").unwrap_or("")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.str_value("/metadata/namespace")
    }

    pub fn api_version(&self) -> &str {
        self.str_value("/apiVersion").unwrap_or("")
    }

    pub fn kind(&self) -> &str {
        self.str_value("/kind").unwrap_or("")
    }

    pub fn get_object_id(&self) -> ObjectIdRef {
        let ns = self.namespace().unwrap_or("");
        let name = self.name();
        ObjectIdRef::new(ns, name)
    }

    pub fn is_deletion_timestamp_set(&self) -> bool {
        self.0
            .pointer("/metadata/deletionTimestamp")
            .map(|v| !v.is_null())
            .unwrap_or(false)
    }

    /// Returns the finalizer tokens in the order they appear in the metadata
    pub fn finalizers(&self) -> impl Iterator<Item = &str> {
        self.0
            .pointer("/metadata/finalizers")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    pub fn owner_references(&self) -> impl Iterator<Item = &Value> {
        self.0
            .pointer("/metadata/ownerReferences")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    fn validate(value: &Value) -> Result<(), &'static str> {
        value
            .pointer("/metadata/resourceVersion")
            .ok_or("missing metadata.resourceVersion")?;
        value.pointer("/metadata/name").ok_or("missing metadata.name")?;
        value.pointer("/metadata/uid").ok_or("missing metadata.uid")?;
        value.pointer("/apiVersion").ok_or("missing apiVersion")?;
        value.pointer("/kind").ok_or("missing kind")?;
        Ok(())
    }

    pub fn str_value(&self, pointer: &str) -> Option<&str> {
        self.0.pointer(pointer).and_then(Value::as_str)
    }
}

impl Deref for K8sResource {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl std::convert::AsRef<Value> for K8sResource {
    fn as_ref(&self) -> &Value {
        &self.0
    }
}

impl Into<Value> for K8sResource {
    fn into(self) -> Value {
        self.into_value()
    }
}

impl std::fmt::Display for K8sResource {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn stored(extra_meta: Value) -> Value {
        let mut value = json!({
            "apiVersion": "webapp.crdlego.com/v1",
            "kind": "WebApp",
            "metadata": {
                "namespace": "default",
                "name": "demo",
                "uid": "uid-1",
                "resourceVersion": "7",
            }
        });
        if let (Some(meta), Value::Object(extra)) = (
            value.pointer_mut("/metadata").and_then(Value::as_object_mut),
            extra_meta,
        ) {
            meta.extend(extra);
        }
        value
    }

    #[test]
    fn from_value_rejects_objects_without_store_metadata() {
        let value = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "demo-configmap" }
        });
        let err = K8sResource::from_value(value).unwrap_err();
        assert_eq!("missing metadata.resourceVersion", err.message);
    }

    #[test]
    fn accessors_read_metadata() {
        let resource = K8sResource::from_value(stored(json!({
            "finalizers": ["a", "webapp.crdlego.com/finalizer"],
            "deletionTimestamp": "2025-01-01T00:00:00Z",
            "ownerReferences": [{ "kind": "Cluster", "name": "east", "uid": "uid-0" }],
        })))
        .unwrap();
        assert_eq!("7", resource.resource_version());
        assert_eq!("uid-1", resource.uid());
        assert_eq!(ObjectIdRef::new("default", "demo"), resource.get_object_id());
        assert!(resource.is_deletion_timestamp_set());
        let finalizers: Vec<&str> = resource.finalizers().collect();
        assert_eq!(vec!["a", "webapp.crdlego.com/finalizer"], finalizers);
        let owner_uids: Vec<&Value> = resource.owner_references().map(|r| &r["uid"]).collect();
        assert_eq!(vec![&json!("uid-0")], owner_uids);
    }

    #[test]
    fn null_deletion_timestamp_is_not_set() {
        let resource =
            K8sResource::from_value(stored(json!({ "deletionTimestamp": null }))).unwrap();
        assert!(!resource.is_deletion_timestamp_set());
        assert_eq!(0, resource.finalizers().count());
        assert_eq!(0, resource.owner_references().count());
    }
}
