// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress attachment of external certificates.
//!
//! Two annotations on an ingress describe the relationship:
//!
//! - `networking.gke.io/managed-certificates` is written by users and lists
//!   the `CertificateRequest` names (same namespace) the ingress wants
//! - `ingress.gcp.kubernetes.io/pre-shared-cert` is written by the controller
//!   and lists the external certificate names the load balancer serves
//!
//! Both are comma-separated ordered sets. The binder functions below are pure:
//! they preserve the relative order of entries they do not touch and never
//! duplicate an entry, so attaching or detaching twice is a no-op.
//!
//! The [`IngressClient`] trait is the narrow view of the ingress API the
//! reconciler needs: a cached list, a fresh read and an update guarded by
//! `resourceVersion`.

use crate::constants::{
    ANNOTATION_LIST_SEPARATOR, FIELD_MANAGER, MANAGED_CERTIFICATES_ANNOTATION,
    PRE_SHARED_CERT_ANNOTATION,
};
use crate::store::ReconcileKey;
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::PostParams;
use kube::runtime::reflector::Store;
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;

/// Split an annotation value into an ordered, duplicate-free list.
///
/// Empty entries and surrounding whitespace are dropped.
#[must_use]
pub fn parse_list(value: &str) -> Vec<String> {
    let mut entries: Vec<String> = Vec::new();
    for entry in value.split(ANNOTATION_LIST_SEPARATOR) {
        let entry = entry.trim();
        if !entry.is_empty() && !entries.iter().any(|e| e == entry) {
            entries.push(entry.to_string());
        }
    }
    entries
}

/// Join a list back into an annotation value.
#[must_use]
pub fn format_list(entries: &[String]) -> String {
    entries.join(&ANNOTATION_LIST_SEPARATOR.to_string())
}

/// External certificate names currently attached to the ingress.
#[must_use]
pub fn list(ingress: &Ingress) -> Vec<String> {
    ingress
        .annotations()
        .get(PRE_SHARED_CERT_ANNOTATION)
        .map(|value| parse_list(value))
        .unwrap_or_default()
}

/// `CertificateRequest` names the ingress asks for.
#[must_use]
pub fn requested_certificates(ingress: &Ingress) -> Vec<String> {
    ingress
        .annotations()
        .get(MANAGED_CERTIFICATES_ANNOTATION)
        .map(|value| parse_list(value))
        .unwrap_or_default()
}

/// Whether the ingress asks for the `CertificateRequest` `name`.
#[must_use]
pub fn requests(ingress: &Ingress, name: &str) -> bool {
    requested_certificates(ingress).iter().any(|n| n == name)
}

/// Whether `cert_name` is attached to the ingress.
#[must_use]
pub fn is_attached(ingress: &Ingress, cert_name: &str) -> bool {
    list(ingress).iter().any(|n| n == cert_name)
}

/// Append `cert_name` to the attached list. Returns `false` if already present.
pub fn attach(ingress: &mut Ingress, cert_name: &str) -> bool {
    let mut entries = list(ingress);
    if entries.iter().any(|n| n == cert_name) {
        return false;
    }
    entries.push(cert_name.to_string());
    write_list(ingress, &entries);
    true
}

/// Remove `cert_name` from the attached list. Returns `false` if it was absent.
///
/// The annotation is removed entirely once the list becomes empty.
pub fn detach(ingress: &mut Ingress, cert_name: &str) -> bool {
    let mut entries = list(ingress);
    let before = entries.len();
    entries.retain(|n| n != cert_name);
    if entries.len() == before {
        return false;
    }
    write_list(ingress, &entries);
    true
}

fn write_list(ingress: &mut Ingress, entries: &[String]) {
    let annotations = ingress.annotations_mut();
    if entries.is_empty() {
        annotations.remove(PRE_SHARED_CERT_ANNOTATION);
    } else {
        annotations.insert(PRE_SHARED_CERT_ANNOTATION.to_string(), format_list(entries));
    }
}

/// `namespace/name` of an ingress, as recorded in `status.attachedIngresses`.
#[must_use]
pub fn ingress_id(ingress: &Ingress) -> String {
    format!(
        "{}/{}",
        ingress.namespace().unwrap_or_default(),
        ingress.name_any()
    )
}

/// Reconcile keys an ingress event should trigger.
///
/// Covers both the `CertificateRequest`s the ingress asks for and the owners of
/// external certificates already attached to it, so that removing a request
/// from the managed-certificates annotation still detaches its certificate.
/// `owner_of` resolves an attached external certificate name to its owner.
pub fn keys_for_ingress<F>(ingress: &Ingress, owner_of: F) -> Vec<ReconcileKey>
where
    F: Fn(&str) -> Option<ReconcileKey>,
{
    let namespace = ingress.namespace().unwrap_or_default();
    let mut keys: Vec<ReconcileKey> = requested_certificates(ingress)
        .into_iter()
        .map(|name| ReconcileKey::new(&namespace, &name))
        .collect();
    keys.extend(list(ingress).iter().filter_map(|cert| owner_of(cert)));

    keys.sort();
    keys.dedup();
    keys
}

/// Ingress API surface used by the reconciler.
#[async_trait]
pub trait IngressClient: Send + Sync {
    /// All ingresses in the watch-fed cache.
    fn list(&self) -> Vec<Arc<Ingress>>;

    /// Fresh read of an ingress from the API server. `Ok(None)` when missing.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, kube::Error>;

    /// Replace an ingress. Fails with HTTP 409 if its `resourceVersion` is stale.
    async fn update(&self, ingress: &Ingress) -> Result<Ingress, kube::Error>;
}

/// [`IngressClient`] backed by a reflector cache and the Kubernetes API.
#[derive(Clone)]
pub struct KubeIngressClient {
    client: Client,
    cache: Store<Ingress>,
}

impl KubeIngressClient {
    /// Create a client reading from `cache` and writing through `client`.
    #[must_use]
    pub fn new(client: Client, cache: Store<Ingress>) -> Self {
        Self { client, cache }
    }
}

#[async_trait]
impl IngressClient for KubeIngressClient {
    fn list(&self) -> Vec<Arc<Ingress>> {
        self.cache.state()
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, kube::Error> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }

    async fn update(&self, ingress: &Ingress) -> Result<Ingress, kube::Error> {
        let namespace = ingress.namespace().unwrap_or_default();
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        api.replace(&ingress.name_any(), &params, ingress).await
    }
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod ingress_tests;
