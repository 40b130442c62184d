// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for managed certificates.
//!
//! # Resource Types
//!
//! - [`CertificateRequest`] - Declares the domains a managed TLS certificate must cover
//!
//! # Example
//!
//! ```rust
//! use managed_certs::crd::CertificateRequestSpec;
//!
//! let spec = CertificateRequestSpec {
//!     domains: vec!["a.example.com".to_string()],
//! };
//! assert_eq!(spec.domains.len(), 1);
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `CertificateRequest` specification.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "certs.firestoned.io",
    version = "v1alpha1",
    kind = "CertificateRequest",
    namespaced,
    shortname = "certreq",
    doc = "CertificateRequest declares a managed TLS certificate for a set of domains. The controller provisions the certificate with the cloud load-balancing API and attaches it to every ingress that requests it."
)]
#[kube(status = "CertificateRequestStatus")]
#[kube(
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Certificate","type":"string","jsonPath":".status.certificateName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestSpec {
    /// Domains the certificate must cover.
    ///
    /// Each entry is a fully qualified DNS name without a trailing dot.
    /// Wildcards and IP addresses are not supported by managed certificates.
    pub domains: Vec<String>,
}

/// Lifecycle phase of a `CertificateRequest`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum CertificatePhase {
    /// The external certificate exists but does not yet serve every domain.
    Provisioning,
    /// The external certificate serves every requested domain.
    Active,
    /// The provider reported a terminal error or the spec is invalid.
    Failed,
    /// The certificate is serving but its renewal failed and is being retried.
    Renewing,
}

impl CertificatePhase {
    /// Whether ingresses may reference a certificate in this phase.
    #[must_use]
    pub fn is_attachable(self) -> bool {
        !matches!(self, CertificatePhase::Failed)
    }

    /// Whether the provider must keep being polled in this phase.
    #[must_use]
    pub fn needs_polling(self) -> bool {
        matches!(
            self,
            CertificatePhase::Provisioning | CertificatePhase::Renewing
        )
    }

    /// Name as written to status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CertificatePhase::Provisioning => "Provisioning",
            CertificatePhase::Active => "Active",
            CertificatePhase::Failed => "Failed",
            CertificatePhase::Renewing => "Renewing",
        }
    }
}

impl fmt::Display for CertificatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Only `Ready` is used.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Provider-reported status of a single domain.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DomainStatus {
    /// The domain name.
    pub domain: String,
    /// Provider status string for this domain (e.g. `ACTIVE`, `FAILED_NOT_VISIBLE`).
    pub status: String,
}

/// `CertificateRequest` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestStatus {
    /// Current lifecycle phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<CertificatePhase>,

    /// Name of the external certificate. Assigned once, never changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_name: Option<String>,

    /// Last certificate status observed from the provider, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<String>,

    /// Last per-domain status observed from the provider.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_status: Vec<DomainStatus>,

    /// Ingresses (`namespace/name`) the certificate is attached to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_ingresses: Vec<String>,

    /// Generation of the spec this status was computed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Human-readable detail, set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl CertificateRequest {
    /// Current phase, if any status has been written.
    #[must_use]
    pub fn phase(&self) -> Option<CertificatePhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }
}
