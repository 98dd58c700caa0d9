//! A reconciliation engine for the `WebApp` custom resource. Each `WebApp` declares an image, a
//! replica count, some configuration data, and optionally an Ingress. The engine derives four
//! _child_ resources from it (a ConfigMap, a Deployment, a Service, and an Ingress), keeps them
//! in sync with the `WebApp`, copies the number of available replicas back onto its status, and
//! cleans the children up when the `WebApp` is deleted.
//!
//! The engine doesn't watch anything or talk to an API server itself. It's written against the
//! `ObjectStore` trait, and something else is expected to call `Reconciler::reconcile` whenever a
//! `WebApp` or one of its children changes. `ownership::parent_of` maps a child back to the id of
//! the `WebApp` that should be reconciled.
//!
//! ```no_run
//! use webapp_operator::prelude::*;
//! use webapp_operator::runner::metrics::Metrics;
//!
//! async fn on_change<S: ObjectStore>(reconciler: &Reconciler<S>, namespace: &str, name: &str) {
//!     let id = ObjectIdRef::new(namespace, name);
//!     match reconciler.reconcile_with_timeout(&id, std::time::Duration::from_secs(30)).await {
//!         Ok(outcome) => log::info!("reconciled {}: {:?}", id, outcome),
//!         Err(err) if err.is_retryable() => log::warn!("will retry {}: {}", id, err),
//!         Err(err) => log::error!("failed to reconcile {}: {}", id, err),
//!     }
//! }
//!
//! fn make_reconciler<S: ObjectStore>(store: S) -> Result<Reconciler<S>, prometheus::Error> {
//!     let config = OperatorConfig::new("webapp-operator");
//!     Ok(Reconciler::new(store, config, Metrics::new()?))
//! }
//! ```

#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod k8s_types;
pub mod manifest;
pub mod ownership;
pub mod resource;
pub mod runner;
pub mod webapp;

pub use serde;
pub use serde_json;

pub mod prelude {
    pub use crate::config::OperatorConfig;
    pub use crate::error::Error;
    pub use crate::k8s_types::{self, K8sType};
    pub use crate::resource::{K8sResource, ObjectId, ObjectIdRef};
    pub use crate::runner::client::ObjectStore;
    pub use crate::runner::{Outcome, Phase, Reconciler};
    pub use crate::webapp::{IngressSpec, WebApp, WebAppSpec, WebAppStatus};
    pub use serde::{Deserialize, Serialize};
}
