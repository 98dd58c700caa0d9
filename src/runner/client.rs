//! The object store capability that the engine is written against. The store owns durability
//! and optimistic concurrency: it assigns `uid` and `resourceVersion`, and it rejects any write
//! whose `metadata.resourceVersion` doesn't match what it currently holds.
//!
//! Implementations are expected to map their own failures onto `Error`: a missing object is
//! `Ok(None)` from `get` and `Ok(())` from `delete`, a version mismatch is `Error::Conflict`,
//! and anything that may go away on its own is `Error::Transient`.
use crate::error::Error;
use crate::k8s_types::K8sType;
use crate::resource::{K8sResource, ObjectIdRef};

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Returns the object with the given type and id, or `None` if it doesn't exist
    async fn get(
        &self,
        k8s_type: &K8sType,
        id: &ObjectIdRef<'_>,
    ) -> Result<Option<K8sResource>, Error>;

    /// Creates a new object. Returns `Error::AlreadyExists` if there's already one with the same id
    async fn create(&self, k8s_type: &K8sType, resource: Value) -> Result<K8sResource, Error>;

    /// Replaces the whole object, except for its status. The `metadata.resourceVersion` of
    /// `resource` is the version that the write is expected to replace
    async fn update(&self, k8s_type: &K8sType, resource: Value) -> Result<K8sResource, Error>;

    /// Replaces only the status of the object, leaving the spec and metadata as they are.
    /// Version checked in the same way as `update`
    async fn update_status(
        &self,
        k8s_type: &K8sType,
        resource: Value,
    ) -> Result<K8sResource, Error>;

    /// Deletes the object. Deleting an object that doesn't exist is not an error
    async fn delete(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Result<(), Error>;
}
