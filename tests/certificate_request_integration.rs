// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests of the Kubernetes-backed store and ingress client.
//!
//! They need a cluster with the `CertificateRequest` CRD installed and skip
//! otherwise. The controller itself does not have to be running.
//!
//! Run with: cargo test --test certificate_request_integration -- --ignored

mod common;

use common::{cleanup_test_namespace, create_test_namespace, crd_installed, get_kube_client_or_skip};
use k8s_openapi::api::networking::v1::{
    Ingress, IngressBackend, IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::runtime::reflector;
use kube::ResourceExt;
use managed_certs::constants::{CERTIFICATE_REQUEST_FINALIZER, PRE_SHARED_CERT_ANNOTATION};
use managed_certs::crd::{
    CertificatePhase, CertificateRequest, CertificateRequestSpec, CertificateRequestStatus,
};
use managed_certs::ingress::{self, IngressClient, KubeIngressClient};
use managed_certs::store::{CertificateRequestStore, KubeCertificateRequestStore, ReconcileKey};

const TEST_NAMESPACE: &str = "managed-certs-integration";
const INGRESS_TEST_NAMESPACE: &str = "managed-certs-integration-ingress";

fn certificate_request(name: &str) -> CertificateRequest {
    let mut obj = CertificateRequest::new(
        name,
        CertificateRequestSpec {
            domains: vec!["a.example.com".to_string()],
        },
    );
    obj.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    obj
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_store_finalizer_and_status_lifecycle() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    if !crd_installed(&client).await {
        return;
    }
    create_test_namespace(&client, TEST_NAMESPACE)
        .await
        .expect("create namespace");

    let api: Api<CertificateRequest> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let created = api
        .create(&PostParams::default(), &certificate_request("store-lifecycle"))
        .await
        .expect("create CertificateRequest");

    let (cache, _writer) = reflector::store();
    let store = KubeCertificateRequestStore::new(client.clone(), cache);

    let with_finalizer = store.add_finalizer(&created).await.expect("add finalizer");
    assert!(with_finalizer
        .finalizers()
        .contains(&CERTIFICATE_REQUEST_FINALIZER.to_string()));

    let status = CertificateRequestStatus {
        phase: Some(CertificatePhase::Provisioning),
        certificate_name: Some("cert-store-lifecycle-test".to_string()),
        ..Default::default()
    };
    let updated = store
        .update_status(&with_finalizer, &status)
        .await
        .expect("write status");
    assert_eq!(updated.phase(), Some(CertificatePhase::Provisioning));

    // A write based on an old resourceVersion is rejected.
    let stale = store.update_status(&with_finalizer, &status).await;
    assert!(matches!(stale, Err(kube::Error::Api(ref e)) if e.code == 409));

    store
        .delete(&ReconcileKey::new(TEST_NAMESPACE, "store-lifecycle"))
        .await
        .expect("delete");
    let deleting = api.get("store-lifecycle").await.expect("still present");
    assert!(deleting.metadata.deletion_timestamp.is_some());

    store.remove_finalizer(&deleting).await.expect("remove finalizer");
    assert!(api.get_opt("store-lifecycle").await.unwrap().is_none());

    cleanup_test_namespace(&client, TEST_NAMESPACE).await;
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_ingress_client_attach_and_conflict() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    create_test_namespace(&client, INGRESS_TEST_NAMESPACE)
        .await
        .expect("create namespace");

    let api: Api<Ingress> = Api::namespaced(client.clone(), INGRESS_TEST_NAMESPACE);
    let ing = Ingress {
        metadata: ObjectMeta {
            name: Some("web".to_string()),
            namespace: Some(INGRESS_TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            default_backend: Some(IngressBackend {
                service: Some(IngressServiceBackend {
                    name: "web".to_string(),
                    port: Some(ServiceBackendPort {
                        number: Some(80),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };
    let created = api
        .create(&PostParams::default(), &ing)
        .await
        .expect("create ingress");

    let (cache, _writer) = reflector::store();
    let ingresses = KubeIngressClient::new(client.clone(), cache);

    let mut fresh = ingresses
        .get(INGRESS_TEST_NAMESPACE, "web")
        .await
        .expect("get ingress")
        .expect("ingress exists");
    assert!(ingress::attach(&mut fresh, "cert-web-test"));
    let updated = ingresses.update(&fresh).await.expect("update ingress");
    assert_eq!(
        updated.annotations().get(PRE_SHARED_CERT_ANNOTATION).map(String::as_str),
        Some("cert-web-test")
    );

    // The original object carries a stale resourceVersion.
    let mut stale = created;
    ingress::attach(&mut stale, "cert-other");
    let result = ingresses.update(&stale).await;
    assert!(matches!(result, Err(kube::Error::Api(ref e)) if e.code == 409));

    cleanup_test_namespace(&client, INGRESS_TEST_NAMESPACE).await;
}
