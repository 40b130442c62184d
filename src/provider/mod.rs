// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! External certificate client.
//!
//! The cloud load-balancing API owns the actual TLS certificates. The
//! controller only needs three operations against it, expressed by the
//! [`CertificateProvider`] trait:
//!
//! - [`CertificateProvider::get`] - read name, domains and provisioning status
//! - [`CertificateProvider::ensure_exists`] - create, or update the domains in place
//! - [`CertificateProvider::delete`] - remove; a missing certificate is success
//!
//! Certificate issuance is opaque and eventually consistent: after a create the
//! provider reports `PROVISIONING` until every domain serves, then `ACTIVE`.

pub mod http;

pub use http::HttpCertificateProvider;

use crate::errors::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Provisioning status of an external certificate as reported by the provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProviderStatus {
    /// `MANAGED_CERTIFICATE_STATUS_UNSPECIFIED`
    #[default]
    Unspecified,
    /// `PROVISIONING`
    Provisioning,
    /// `ACTIVE`
    Active,
    /// `PROVISIONING_FAILED`
    ProvisioningFailed,
    /// `PROVISIONING_FAILED_PERMANENTLY`
    ProvisioningFailedPermanently,
    /// `RENEWAL_FAILED`
    RenewalFailed,
    /// Any status string this controller does not know, kept verbatim.
    Other(String),
}

impl ProviderStatus {
    /// Parse the provider's wire representation.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "MANAGED_CERTIFICATE_STATUS_UNSPECIFIED" => ProviderStatus::Unspecified,
            "PROVISIONING" => ProviderStatus::Provisioning,
            "ACTIVE" => ProviderStatus::Active,
            "PROVISIONING_FAILED" => ProviderStatus::ProvisioningFailed,
            "PROVISIONING_FAILED_PERMANENTLY" => ProviderStatus::ProvisioningFailedPermanently,
            "RENEWAL_FAILED" => ProviderStatus::RenewalFailed,
            other => ProviderStatus::Other(other.to_string()),
        }
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ProviderStatus::Unspecified => "MANAGED_CERTIFICATE_STATUS_UNSPECIFIED",
            ProviderStatus::Provisioning => "PROVISIONING",
            ProviderStatus::Active => "ACTIVE",
            ProviderStatus::ProvisioningFailed => "PROVISIONING_FAILED",
            ProviderStatus::ProvisioningFailedPermanently => "PROVISIONING_FAILED_PERMANENTLY",
            ProviderStatus::RenewalFailed => "RENEWAL_FAILED",
            ProviderStatus::Other(value) => value,
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProviderStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(ProviderStatus::parse(&value))
    }
}

/// Snapshot of an external certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalCertificate {
    /// Provider resource name (generated by [`crate::naming`])
    pub name: String,
    /// Owner tag written at creation time
    pub description: String,
    /// Domains covered by the certificate
    pub domains: Vec<String>,
    /// Overall provisioning status
    pub status: ProviderStatus,
    /// Per-domain serving status (domain -> provider status string)
    pub domain_status: BTreeMap<String, String>,
}

impl ExternalCertificate {
    /// Whether the certificate covers exactly `domains`, ignoring order and case.
    #[must_use]
    pub fn has_domains(&self, domains: &[String]) -> bool {
        normalize_domains(&self.domains) == normalize_domains(domains)
    }
}

/// Lowercase, sort and de-duplicate a domain list.
#[must_use]
pub fn normalize_domains(domains: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = domains.iter().map(|d| d.to_ascii_lowercase()).collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Operations the reconciler needs from the cloud certificate API.
#[async_trait]
pub trait CertificateProvider: Send + Sync {
    /// Read a certificate. `Ok(None)` when it does not exist.
    async fn get(&self, name: &str) -> Result<Option<ExternalCertificate>, ProviderError>;

    /// Make sure a certificate named `name` exists and covers `domains`.
    ///
    /// Creates the certificate (with `description` as owner tag) when absent and
    /// updates its domains when they differ. Calling it for a certificate that
    /// already has the requested domains is a no-op.
    async fn ensure_exists(
        &self,
        name: &str,
        domains: &[String],
        description: &str,
    ) -> Result<(), ProviderError>;

    /// Delete a certificate. Deleting a missing certificate succeeds.
    async fn delete(&self, name: &str) -> Result<(), ProviderError>;
}
