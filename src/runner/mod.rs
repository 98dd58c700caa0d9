//! The entry point for running reconciliation passes. A `Reconciler` is given the id of a parent
//! whenever something about that parent (or any of its children) may have changed, and performs
//! a single complete pass against the store.
//!
//! The `Reconciler` keeps no state between passes. Deciding when to call it, deduplicating
//! requests for the same parent, and retrying failed passes are all left to the caller.
pub mod client;
pub mod metrics;
pub(crate) mod reconcile;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use self::reconcile::{Outcome, Phase};

use crate::config::OperatorConfig;
use crate::error::Error;
use crate::resource::ObjectIdRef;
use client::ObjectStore;
use metrics::Metrics;
use reconcile::PassContext;

use futures::future::{self, Either};

use std::future::Future;
use std::time::Duration;

pub struct Reconciler<S: ObjectStore> {
    store: S,
    config: OperatorConfig,
    metrics: Metrics,
}

impl<S: ObjectStore> std::fmt::Debug for Reconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish()
    }
}

impl<S: ObjectStore> Reconciler<S> {
    pub fn new(store: S, config: OperatorConfig, metrics: Metrics) -> Reconciler<S> {
        Reconciler {
            store,
            config,
            metrics,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Performs one pass for the parent with the given id. An error means the pass was
    /// abandoned partway through, and should be retried from the beginning at some point.
    pub async fn reconcile(&self, parent_id: &ObjectIdRef<'_>) -> Result<Outcome, Error> {
        let ctx = PassContext {
            store: &self.store,
            config: &self.config,
            metrics: &self.metrics,
        };
        reconcile::run_pass(&ctx, parent_id).await
    }

    /// Performs one pass, unless `signal` completes first. In that case the pass is dropped
    /// wherever it happens to be, including in the middle of a store call, and
    /// `Error::Cancelled` is returned.
    pub async fn reconcile_until<F>(
        &self,
        parent_id: &ObjectIdRef<'_>,
        signal: F,
    ) -> Result<Outcome, Error>
    where
        F: Future<Output = ()>,
    {
        let pass = Box::pin(self.reconcile(parent_id));
        let signal = Box::pin(signal);
        match future::select(pass, signal).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => {
                log::warn!("Pass for parent: {} was cancelled", parent_id);
                Err(Error::Cancelled)
            }
        }
    }

    /// Performs one pass, giving up with `Error::Cancelled` if it hasn't finished in time
    pub async fn reconcile_with_timeout(
        &self,
        parent_id: &ObjectIdRef<'_>,
        timeout: Duration,
    ) -> Result<Outcome, Error> {
        match tokio::time::timeout(timeout, self.reconcile(parent_id)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "Pass for parent: {} timed out after {}ms",
                    parent_id,
                    timeout.as_millis()
                );
                Err(Error::Cancelled)
            }
        }
    }
}
