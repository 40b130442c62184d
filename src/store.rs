// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed access to `CertificateRequest` objects.
//!
//! Reads are served from a watch-fed reflector cache, which the reconciler
//! treats as read-only. Every write goes through the Kubernetes API and carries
//! the object's `resourceVersion`, so a stale write fails with HTTP 409 and is
//! retried by the work queue.

use crate::constants::{CERTIFICATE_REQUEST_FINALIZER, FIELD_MANAGER};
use crate::crd::{CertificateRequest, CertificateRequestStatus};
use crate::errors::is_not_found;
use crate::reconcilers::finalizers::{finalizer_patch, with_finalizer, without_finalizer};
use async_trait::async_trait;
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Identity of a `CertificateRequest`: the unit of work in the queue.
///
/// Carries no payload. The reconciler always re-reads current state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReconcileKey {
    pub namespace: String,
    pub name: String,
}

impl ReconcileKey {
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Key of a namespaced object.
    #[must_use]
    pub fn from_object<K: Resource>(obj: &K) -> Self {
        Self::new(&obj.namespace().unwrap_or_default(), &obj.name_any())
    }
}

impl fmt::Display for ReconcileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Operations the reconciler needs on `CertificateRequest` objects.
#[async_trait]
pub trait CertificateRequestStore: Send + Sync {
    /// Cached object for `key`, if the cache has seen it.
    fn get(&self, key: &ReconcileKey) -> Option<Arc<CertificateRequest>>;

    /// Every cached object.
    fn list(&self) -> Vec<Arc<CertificateRequest>>;

    /// Replace the status of `obj`. Fails with 409 if `obj` is stale.
    async fn update_status(
        &self,
        obj: &CertificateRequest,
        status: &CertificateRequestStatus,
    ) -> Result<CertificateRequest, kube::Error>;

    /// Add the controller finalizer. Returns the updated object.
    async fn add_finalizer(&self, obj: &CertificateRequest)
        -> Result<CertificateRequest, kube::Error>;

    /// Remove the controller finalizer, letting the API server delete the object.
    async fn remove_finalizer(&self, obj: &CertificateRequest) -> Result<(), kube::Error>;

    /// Delete the object. A missing object is not an error.
    async fn delete(&self, key: &ReconcileKey) -> Result<(), kube::Error>;
}

/// [`CertificateRequestStore`] backed by a reflector cache and the Kubernetes API.
#[derive(Clone)]
pub struct KubeCertificateRequestStore {
    client: Client,
    cache: Store<CertificateRequest>,
}

impl KubeCertificateRequestStore {
    #[must_use]
    pub fn new(client: Client, cache: Store<CertificateRequest>) -> Self {
        Self { client, cache }
    }

    fn api(&self, namespace: &str) -> Api<CertificateRequest> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn patch_finalizers(
        &self,
        obj: &CertificateRequest,
        finalizers: Vec<String>,
    ) -> Result<CertificateRequest, kube::Error> {
        let namespace = obj.namespace().unwrap_or_default();
        let patch = finalizer_patch(&finalizers, obj.resource_version().as_deref());
        self.api(&namespace)
            .patch(
                &obj.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
    }
}

#[async_trait]
impl CertificateRequestStore for KubeCertificateRequestStore {
    fn get(&self, key: &ReconcileKey) -> Option<Arc<CertificateRequest>> {
        self.cache
            .get(&ObjectRef::new(&key.name).within(&key.namespace))
    }

    fn list(&self) -> Vec<Arc<CertificateRequest>> {
        self.cache.state()
    }

    async fn update_status(
        &self,
        obj: &CertificateRequest,
        status: &CertificateRequestStatus,
    ) -> Result<CertificateRequest, kube::Error> {
        let namespace = obj.namespace().unwrap_or_default();
        let name = obj.name_any();

        // Server-side apply drops fields this manager no longer sets; the
        // resourceVersion turns a stale write into a 409.
        let patch = json!({
            "apiVersion": CertificateRequest::api_version(&()),
            "kind": CertificateRequest::kind(&()),
            "metadata": {
                "name": name,
                "namespace": namespace,
                "resourceVersion": obj.resource_version(),
            },
            "status": status,
        });

        debug!(namespace = %namespace, name = %name, "Writing CertificateRequest status");
        self.api(&namespace)
            .patch_status(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&patch),
            )
            .await
    }

    async fn add_finalizer(
        &self,
        obj: &CertificateRequest,
    ) -> Result<CertificateRequest, kube::Error> {
        match with_finalizer(obj, CERTIFICATE_REQUEST_FINALIZER) {
            Some(finalizers) => self.patch_finalizers(obj, finalizers).await,
            None => Ok(obj.clone()),
        }
    }

    async fn remove_finalizer(&self, obj: &CertificateRequest) -> Result<(), kube::Error> {
        if let Some(finalizers) = without_finalizer(obj, CERTIFICATE_REQUEST_FINALIZER) {
            match self.patch_finalizers(obj, finalizers).await {
                Ok(_) => {}
                Err(e) if is_not_found(&e) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &ReconcileKey) -> Result<(), kube::Error> {
        match self
            .api(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
