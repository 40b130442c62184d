// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the reconciler.
//!
//! Every collaborator is passed in explicitly as a trait object, so the
//! reconciler runs unchanged against the Kubernetes API and the cloud provider
//! in production and against in-memory fakes in tests. There is no global
//! client state.

use crate::constants::DEFAULT_PROVIDER_POLL_INTERVAL_SECS;
use crate::crd::CertificateRequest;
use crate::events::EventPublisher;
use crate::ingress::IngressClient;
use crate::naming::external_certificate_name;
use crate::provider::CertificateProvider;
use crate::store::{CertificateRequestStore, ReconcileKey};
use kube::ResourceExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Tunables of the reconcile loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// How often to re-read a certificate that is still provisioning or renewing
    pub poll_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_PROVIDER_POLL_INTERVAL_SECS),
        }
    }
}

/// Shared context passed to every reconcile.
#[derive(Clone)]
pub struct Context {
    /// `CertificateRequest` cache and writer
    pub certificates: Arc<dyn CertificateRequestStore>,

    /// Ingress cache and writer
    pub ingresses: Arc<dyn IngressClient>,

    /// Cloud certificate API
    pub provider: Arc<dyn CertificateProvider>,

    /// Kubernetes Event sink
    pub events: Arc<dyn EventPublisher>,

    pub config: ReconcilerConfig,

    /// Keys this process has reconciled as live objects
    pub known: KnownKeys,
}

/// Keys of `CertificateRequest`s seen alive since startup.
///
/// A key that disappears from the cache without ever having been seen (for
/// example a name an ingress requests that was never created) has nothing to
/// clean up unless some ingress still carries its certificate.
#[derive(Clone, Default)]
pub struct KnownKeys(Arc<Mutex<HashSet<ReconcileKey>>>);

impl KnownKeys {
    fn lock(&self) -> MutexGuard<'_, HashSet<ReconcileKey>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `key` as a live object.
    pub fn observe(&self, key: &ReconcileKey) {
        self.lock().insert(key.clone());
    }

    /// Whether `key` has been seen alive and not yet cleaned up.
    #[must_use]
    pub fn contains(&self, key: &ReconcileKey) -> bool {
        self.lock().contains(key)
    }

    /// Drop `key` once its teardown has finished.
    pub fn forget(&self, key: &ReconcileKey) {
        self.lock().remove(key);
    }
}

impl Context {
    /// Key of the cached `CertificateRequest` owning the external certificate `cert_name`.
    ///
    /// Matches the name recorded in status first, then the name the request
    /// would be assigned, so a request that never wrote status still resolves.
    #[must_use]
    pub fn owner_of_certificate(&self, cert_name: &str) -> Option<ReconcileKey> {
        self.certificates
            .list()
            .iter()
            .find(|obj| certificate_name_of(obj) == cert_name)
            .map(|obj| ReconcileKey::from_object(obj.as_ref()))
    }
}

/// External certificate name of a request: from status once assigned,
/// otherwise derived from its identity.
#[must_use]
pub fn certificate_name_of(obj: &CertificateRequest) -> String {
    obj.status
        .as_ref()
        .and_then(|s| s.certificate_name.clone())
        .unwrap_or_else(|| {
            external_certificate_name(&obj.namespace().unwrap_or_default(), &obj.name_any())
        })
}
