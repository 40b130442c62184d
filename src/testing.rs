// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes of every reconciler collaborator, for unit tests.
//!
//! The fakes behave like their real counterparts where the reconciler can
//! tell the difference: writes bump `resourceVersion` and reject stale
//! objects with HTTP 409, removing the last finalizer of a deleting object
//! removes it, and the provider keeps certificates by name with call counters.

use crate::constants::CERTIFICATE_REQUEST_FINALIZER;
use crate::context::{Context, KnownKeys, ReconcilerConfig};
use crate::crd::{CertificateRequest, CertificateRequestSpec, CertificateRequestStatus};
use crate::errors::ProviderError;
use crate::events::EventPublisher;
use crate::ingress::IngressClient;
use crate::provider::{normalize_domains, CertificateProvider, ExternalCertificate, ProviderStatus};
use crate::reconcilers::finalizers::{with_finalizer, without_finalizer};
use crate::store::{CertificateRequestStore, ReconcileKey};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::jiff::Timestamp;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(Box::new(kube::core::Status {
        status: Some(kube::core::response::StatusSummary::Failure),
        message: format!("{reason} (test)"),
        reason: reason.to_string(),
        code,
        metadata: None,
        details: None,
    }))
}

fn bump(meta: &mut ObjectMeta) {
    let next = meta
        .resource_version
        .as_deref()
        .and_then(|rv| rv.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    meta.resource_version = Some(next.to_string());
}

/// Build a `CertificateRequest` as the API server would return it.
pub fn certificate_request(namespace: &str, name: &str, domains: &[&str]) -> CertificateRequest {
    CertificateRequest {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{namespace}-{name}")),
            generation: Some(1),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: CertificateRequestSpec {
            domains: domains.iter().map(ToString::to_string).collect(),
        },
        status: None,
    }
}

/// Build an ingress requesting `requested` through the managed-certificates annotation.
pub fn ingress(namespace: &str, name: &str, requested: &[&str]) -> Ingress {
    let mut annotations = BTreeMap::new();
    if !requested.is_empty() {
        annotations.insert(
            crate::constants::MANAGED_CERTIFICATES_ANNOTATION.to_string(),
            requested.join(","),
        );
    }
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(annotations),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

// ============================================================================
// CertificateRequest store
// ============================================================================

#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<BTreeMap<ReconcileKey, CertificateRequest>>,
    pub status_writes: AtomicUsize,
    fail_status: Mutex<VecDeque<kube::Error>>,
}

impl FakeStore {
    pub fn insert(&self, obj: CertificateRequest) {
        let key = ReconcileKey::from_object(&obj);
        self.objects.lock().unwrap().insert(key, obj);
    }

    pub fn object(&self, key: &ReconcileKey) -> Option<CertificateRequest> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn status(&self, key: &ReconcileKey) -> Option<CertificateRequestStatus> {
        self.object(key).and_then(|o| o.status)
    }

    /// Replace the domains as a user edit would, bumping the generation.
    pub fn edit_domains(&self, key: &ReconcileKey, domains: &[&str]) {
        let mut objects = self.objects.lock().unwrap();
        let obj = objects.get_mut(key).expect("object exists");
        obj.spec.domains = domains.iter().map(ToString::to_string).collect();
        obj.metadata.generation = obj.metadata.generation.map(|g| g + 1);
        bump(&mut obj.metadata);
    }

    /// Start deleting the object; it disappears once its finalizers are gone.
    pub fn mark_deleted(&self, key: &ReconcileKey) {
        let mut objects = self.objects.lock().unwrap();
        let Some(obj) = objects.get_mut(key) else {
            return;
        };
        if obj.finalizers().is_empty() {
            objects.remove(key);
            return;
        }
        obj.metadata.deletion_timestamp = Some(Time(Timestamp::now()));
        bump(&mut obj.metadata);
    }

    /// Drop the object outright, as if its finalizer had been stripped by hand.
    pub fn remove(&self, key: &ReconcileKey) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn fail_next_status_write(&self, err: kube::Error) {
        self.fail_status.lock().unwrap().push_back(err);
    }

    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    fn check_version(stored: &CertificateRequest, obj: &CertificateRequest) -> Result<(), kube::Error> {
        if stored.resource_version() != obj.resource_version() {
            return Err(api_error(409, "Conflict"));
        }
        Ok(())
    }
}

#[async_trait]
impl CertificateRequestStore for FakeStore {
    fn get(&self, key: &ReconcileKey) -> Option<Arc<CertificateRequest>> {
        self.object(key).map(Arc::new)
    }

    fn list(&self) -> Vec<Arc<CertificateRequest>> {
        self.objects
            .lock()
            .unwrap()
            .values()
            .cloned()
            .map(Arc::new)
            .collect()
    }

    async fn update_status(
        &self,
        obj: &CertificateRequest,
        status: &CertificateRequestStatus,
    ) -> Result<CertificateRequest, kube::Error> {
        if let Some(err) = self.fail_status.lock().unwrap().pop_front() {
            return Err(err);
        }
        let key = ReconcileKey::from_object(obj);
        let mut objects = self.objects.lock().unwrap();
        let stored = objects.get_mut(&key).ok_or_else(|| api_error(404, "NotFound"))?;
        Self::check_version(stored, obj)?;
        stored.status = Some(status.clone());
        bump(&mut stored.metadata);
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }

    async fn add_finalizer(
        &self,
        obj: &CertificateRequest,
    ) -> Result<CertificateRequest, kube::Error> {
        let Some(finalizers) = with_finalizer(obj, CERTIFICATE_REQUEST_FINALIZER) else {
            return Ok(obj.clone());
        };
        let key = ReconcileKey::from_object(obj);
        let mut objects = self.objects.lock().unwrap();
        let stored = objects.get_mut(&key).ok_or_else(|| api_error(404, "NotFound"))?;
        Self::check_version(stored, obj)?;
        stored.metadata.finalizers = Some(finalizers);
        bump(&mut stored.metadata);
        Ok(stored.clone())
    }

    async fn remove_finalizer(&self, obj: &CertificateRequest) -> Result<(), kube::Error> {
        let Some(finalizers) = without_finalizer(obj, CERTIFICATE_REQUEST_FINALIZER) else {
            return Ok(());
        };
        let key = ReconcileKey::from_object(obj);
        let mut objects = self.objects.lock().unwrap();
        let Some(stored) = objects.get_mut(&key) else {
            return Ok(());
        };
        Self::check_version(stored, obj)?;
        if finalizers.is_empty() && stored.metadata.deletion_timestamp.is_some() {
            objects.remove(&key);
        } else {
            stored.metadata.finalizers = Some(finalizers);
            bump(&mut stored.metadata);
        }
        Ok(())
    }

    async fn delete(&self, key: &ReconcileKey) -> Result<(), kube::Error> {
        self.mark_deleted(key);
        Ok(())
    }
}

// ============================================================================
// Certificate provider
// ============================================================================

#[derive(Default)]
pub struct FakeProvider {
    certificates: Mutex<BTreeMap<String, ExternalCertificate>>,
    pub gets: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    fail_get: Mutex<VecDeque<ProviderError>>,
    fail_ensure: Mutex<VecDeque<ProviderError>>,
    fail_delete: Mutex<VecDeque<ProviderError>>,
}

impl FakeProvider {
    pub fn certificate(&self, name: &str) -> Option<ExternalCertificate> {
        self.certificates.lock().unwrap().get(name).cloned()
    }

    pub fn insert(&self, cert: ExternalCertificate) {
        self.certificates
            .lock()
            .unwrap()
            .insert(cert.name.clone(), cert);
    }

    /// Simulate the provider finishing (or failing) provisioning.
    pub fn set_status(&self, name: &str, status: ProviderStatus) {
        if let Some(cert) = self.certificates.lock().unwrap().get_mut(name) {
            cert.status = status;
        }
    }

    pub fn fail_next_get(&self, err: ProviderError) {
        self.fail_get.lock().unwrap().push_back(err);
    }

    pub fn fail_next_ensure(&self, err: ProviderError) {
        self.fail_ensure.lock().unwrap().push_back(err);
    }

    pub fn fail_next_delete(&self, err: ProviderError) {
        self.fail_delete.lock().unwrap().push_back(err);
    }

    /// Calls that changed provider state.
    pub fn mutations(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateProvider for FakeProvider {
    async fn get(&self, name: &str) -> Result<Option<ExternalCertificate>, ProviderError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_get.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.certificate(name))
    }

    async fn ensure_exists(
        &self,
        name: &str,
        domains: &[String],
        description: &str,
    ) -> Result<(), ProviderError> {
        if let Some(err) = self.fail_ensure.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut certificates = self.certificates.lock().unwrap();
        match certificates.get_mut(name) {
            Some(cert) if cert.has_domains(domains) => {}
            Some(cert) => {
                cert.domains = normalize_domains(domains);
                cert.status = ProviderStatus::Provisioning;
                self.updates.fetch_add(1, Ordering::SeqCst);
            }
            None => {
                certificates.insert(
                    name.to_string(),
                    ExternalCertificate {
                        name: name.to_string(),
                        description: description.to_string(),
                        domains: normalize_domains(domains),
                        status: ProviderStatus::Provisioning,
                        domain_status: BTreeMap::new(),
                    },
                );
                self.creates.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        if let Some(err) = self.fail_delete.lock().unwrap().pop_front() {
            return Err(err);
        }
        if self.certificates.lock().unwrap().remove(name).is_some() {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ============================================================================
// Ingress client
// ============================================================================

#[derive(Default)]
pub struct FakeIngresses {
    ingresses: Mutex<BTreeMap<(String, String), Ingress>>,
    pub updates: AtomicUsize,
    fail_update: Mutex<VecDeque<kube::Error>>,
}

impl FakeIngresses {
    pub fn insert(&self, ing: Ingress) {
        let key = (ing.namespace().unwrap_or_default(), ing.name_any());
        self.ingresses.lock().unwrap().insert(key, ing);
    }

    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.ingresses
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn fail_next_update(&self, err: kube::Error) {
        self.fail_update.lock().unwrap().push_back(err);
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngressClient for FakeIngresses {
    fn list(&self) -> Vec<Arc<Ingress>> {
        self.ingresses
            .lock()
            .unwrap()
            .values()
            .cloned()
            .map(Arc::new)
            .collect()
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, kube::Error> {
        Ok(self.ingress(namespace, name))
    }

    async fn update(&self, ing: &Ingress) -> Result<Ingress, kube::Error> {
        if let Some(err) = self.fail_update.lock().unwrap().pop_front() {
            return Err(err);
        }
        let key = (ing.namespace().unwrap_or_default(), ing.name_any());
        let mut ingresses = self.ingresses.lock().unwrap();
        let stored = ingresses
            .get_mut(&key)
            .ok_or_else(|| api_error(404, "NotFound"))?;
        if stored.resource_version() != ing.resource_version() {
            return Err(api_error(409, "Conflict"));
        }
        let mut updated = ing.clone();
        bump(&mut updated.metadata);
        *stored = updated.clone();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub note: Option<String>,
}

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.reason.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            note,
        });
    }
}

// ============================================================================
// Context
// ============================================================================

/// Fakes wired into a [`Context`].
pub struct Harness {
    pub store: Arc<FakeStore>,
    pub provider: Arc<FakeProvider>,
    pub ingresses: Arc<FakeIngresses>,
    pub events: Arc<RecordingEvents>,
    pub ctx: Context,
}

pub const TEST_POLL_INTERVAL: Duration = Duration::from_secs(30);

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(FakeStore::default());
        let provider = Arc::new(FakeProvider::default());
        let ingresses = Arc::new(FakeIngresses::default());
        let events = Arc::new(RecordingEvents::default());
        let ctx = Context {
            certificates: store.clone(),
            ingresses: ingresses.clone(),
            provider: provider.clone(),
            events: events.clone(),
            config: ReconcilerConfig {
                poll_interval: TEST_POLL_INTERVAL,
            },
            known: KnownKeys::default(),
        };
        Self {
            store,
            provider,
            ingresses,
            events,
            ctx,
        }
    }
}
