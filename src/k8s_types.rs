use std::fmt::{self, Display};
use std::hash::{self, Hash};

/// A basic description of a Kubernetes resource type, with just enough information to address
/// objects of that type in an object store. We use `&'static str` for all of these so that it's
/// easy to pass references around without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct K8sType {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub plural_kind: &'static str,
}

impl Hash for K8sType {
    fn hash<H: hash::Hasher>(&self, hasher: &mut H) {
        self.api_version.hash(hasher);
        self.kind.hash(hasher);
    }
}

impl K8sType {
    pub fn as_group_and_version(&self) -> (&str, &str) {
        match self.api_version.find('/') {
            Some(slash_idx) => (
                &self.api_version[..slash_idx],
                &self.api_version[(slash_idx + 1)..],
            ),
            None => ("", self.api_version),
        }
    }

    pub fn group(&self) -> &str {
        self.as_group_and_version().0
    }

    pub fn version(&self) -> &str {
        self.as_group_and_version().1
    }

    /// returns true if the given apiVersion and kind both refer to this type
    pub fn is_type(&self, api_version: &str, kind: &str) -> bool {
        self.api_version == api_version && self.kind == kind
    }
}

impl Display for K8sType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.plural_kind)
    }
}

macro_rules! k8s_type {
    ($ref_name:ident, $api_version:expr, $kind:expr, $plural_kind:expr) => {
        #[allow(non_upper_case_globals)]
        pub static $ref_name: &crate::k8s_types::K8sType = &crate::k8s_types::K8sType {
            api_version: $api_version,
            kind: $kind,
            plural_kind: $plural_kind,
        };
    };
}

/// The parent custom resource
pub mod webapp_crdlego_com {
    pub mod v1 {
        k8s_type!(WebApp, "webapp.crdlego.com/v1", "WebApp", "webapps");
    }
}

pub mod core {
    pub mod v1 {
        k8s_type!(ConfigMap, "v1", "ConfigMap", "configmaps");
        k8s_type!(Service, "v1", "Service", "services");
    }
}

pub mod apps {
    pub mod v1 {
        k8s_type!(Deployment, "apps/v1", "Deployment", "deployments");
    }
}

pub mod networking_k8s_io {
    pub mod v1 {
        k8s_type!(Ingress, "networking.k8s.io/v1", "Ingress", "ingresses");
    }
}
