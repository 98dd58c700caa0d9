//! The `WebApp` custom resource, which declares the desired state of a single application:
//! the image to run, how many replicas, the configuration to expose as environment
//! variables, and optionally how to route external traffic to it.
//!
//! Only the fields the engine actually reads are modeled here. The raw `K8sResource` is
//! always kept alongside, and it's the raw value that gets written back to the store, so
//! that fields we don't know about are never dropped.
use crate::error::Error;
use crate::resource::{K8sResource, ObjectId};

use std::collections::BTreeMap;

pub const DEFAULT_INGRESS_PATH: &str = "/";
pub const DEFAULT_INGRESS_PORT: i32 = 80;
pub const DEFAULT_REWRITE_TARGET: &str = "/";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WebApp {
    pub metadata: Metadata,
    pub spec: WebAppSpec,
    /// `None` until the engine writes a status for the first time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WebAppStatus>,
}

/// defines only the fields we care about from the metadata
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WebAppSpec {
    pub image: String,
    /// `None` means that the replica count is left to whatever else manages it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config_data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_target: Option<String>,
    #[serde(default)]
    pub tls: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WebAppStatus {
    #[serde(default)]
    pub available_replicas: i32,
}

/// An `IngressSpec` with every default applied. This is the only place where defaults are
/// decided, so the builders never need to look at an unset field.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedIngress {
    /// `None` leaves the choice to the cluster's default ingress class
    pub class_name: Option<String>,
    /// `None` produces a rule that matches every host
    pub host: Option<String>,
    pub path: String,
    pub port: i32,
    pub rewrite_target: String,
    pub tls: bool,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl IngressSpec {
    /// Applies defaults to every unset field. Values that are present but unusable (empty
    /// strings, non-positive ports) are treated the same as unset ones.
    pub fn resolve(&self) -> ResolvedIngress {
        ResolvedIngress {
            class_name: non_empty(&self.class_name).map(String::from),
            host: non_empty(&self.host).map(String::from),
            path: non_empty(&self.path)
                .unwrap_or(DEFAULT_INGRESS_PATH)
                .to_owned(),
            port: self
                .port
                .filter(|p| *p > 0)
                .unwrap_or(DEFAULT_INGRESS_PORT),
            rewrite_target: non_empty(&self.rewrite_target)
                .unwrap_or(DEFAULT_REWRITE_TARGET)
                .to_owned(),
            tls: self.tls,
        }
    }
}

impl WebAppSpec {
    /// Returns the resolved ingress configuration, but only if an Ingress should exist
    pub fn enabled_ingress(&self) -> Option<ResolvedIngress> {
        self.ingress
            .as_ref()
            .filter(|ingress| ingress.enabled)
            .map(IngressSpec::resolve)
    }
}

impl WebApp {
    pub fn from_resource(resource: &K8sResource) -> Result<WebApp, Error> {
        let webapp = serde_json::from_value(resource.as_ref().clone())?;
        Ok(webapp)
    }

    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.metadata.namespace.as_str(), self.metadata.name.as_str())
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_str()
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_str()
    }

    /// The most recently propagated available replica count, if any has been written yet
    pub fn available_replicas(&self) -> Option<i32> {
        self.status.as_ref().map(|s| s.available_replicas)
    }
}
