use crate::k8s_types::K8sType;

pub const DEFAULT_FINALIZER_NAME: &str = "webapp.crdlego.com/finalizer";
pub const DEFAULT_TRACKING_LABEL_NAME: &str = "app.kubernetes.io/instance";
pub const DEFAULT_OWNERSHIP_LABEL_NAME: &str = "app.kubernetes.io/managed-by";

pub const NGINX_CLASS_NAME: &str = "nginx";
pub const NGINX_REWRITE_TARGET_ANNOTATION: &str = "nginx.ingress.kubernetes.io/rewrite-target";

/// An ingress controller whose rewrite-target convention we know how to express. When an
/// Ingress is built with a class name that matches `class_name`, the rewrite target is
/// attached under `rewrite_target_annotation`.
#[derive(Debug, Clone, PartialEq)]
pub struct IngressController {
    pub class_name: String,
    pub rewrite_target_annotation: String,
}

impl IngressController {
    pub fn new(
        class_name: impl Into<String>,
        rewrite_target_annotation: impl Into<String>,
    ) -> IngressController {
        IngressController {
            class_name: class_name.into(),
            rewrite_target_annotation: rewrite_target_annotation.into(),
        }
    }

    pub fn nginx() -> IngressController {
        IngressController::new(NGINX_CLASS_NAME, NGINX_REWRITE_TARGET_ANNOTATION)
    }
}

/// Configuration of the reconciliation engine. Everything here is fixed for the lifetime
/// of the operator, and none of it is ever read from the `WebApp` resources themselves.
///
/// ```rust
/// use webapp_operator::config::OperatorConfig;
///
/// let config = OperatorConfig::new("webapp-operator")
///     .with_finalizer_name("example.com/cleanup");
/// assert_eq!("example.com/cleanup", config.finalizer_name);
/// assert_eq!("app.kubernetes.io/managed-by", config.ownership_label_name);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorConfig {
    /// The type of the parent resource. Owner references on children point at this type
    pub parent: &'static K8sType,
    pub operator_name: String,
    /// The token added to each parent's finalizers while its children exist
    pub finalizer_name: String,
    /// Label added to every child, with the name of the parent as the value
    pub tracking_label_name: String,
    /// Label added to every child, with the operator name as the value
    pub ownership_label_name: String,
    pub ingress_controller: IngressController,
}

impl OperatorConfig {
    pub fn new(operator_name: impl Into<String>) -> OperatorConfig {
        OperatorConfig {
            parent: crate::k8s_types::webapp_crdlego_com::v1::WebApp,
            operator_name: operator_name.into(),
            finalizer_name: DEFAULT_FINALIZER_NAME.to_owned(),
            tracking_label_name: DEFAULT_TRACKING_LABEL_NAME.to_owned(),
            ownership_label_name: DEFAULT_OWNERSHIP_LABEL_NAME.to_owned(),
            ingress_controller: IngressController::nginx(),
        }
    }

    pub fn with_finalizer_name(mut self, finalizer_name: impl Into<String>) -> Self {
        self.finalizer_name = finalizer_name.into();
        self
    }

    pub fn with_tracking_label_name(mut self, label_name: impl Into<String>) -> Self {
        self.tracking_label_name = label_name.into();
        self
    }

    pub fn with_ownership_label_name(mut self, label_name: impl Into<String>) -> Self {
        self.ownership_label_name = label_name.into();
        self
    }

    pub fn with_ingress_controller(mut self, controller: IngressController) -> Self {
        self.ingress_controller = controller;
        self
    }
}

impl Default for OperatorConfig {
    fn default() -> OperatorConfig {
        OperatorConfig::new("webapp-operator")
    }
}
