// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! REST implementation of [`CertificateProvider`].
//!
//! Talks to the cloud load-balancing API's `sslCertificates` collection:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | get       | `GET    {endpoint}/projects/{project}/global/sslCertificates/{name}` |
//! | create    | `POST   {endpoint}/projects/{project}/global/sslCertificates` |
//! | update    | `PATCH  {endpoint}/projects/{project}/global/sslCertificates/{name}` |
//! | delete    | `DELETE {endpoint}/projects/{project}/global/sslCertificates/{name}` |
//!
//! The client does not retry on its own. Transient failures are returned as
//! retryable [`ProviderError`]s and the work queue requeues the whole reconcile.

use super::{CertificateProvider, ExternalCertificate, ProviderStatus};
use crate::errors::ProviderError;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Certificate type requested from the provider
const MANAGED_CERTIFICATE_TYPE: &str = "MANAGED";

/// Wire representation of a provider certificate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SslCertificateResource {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    certificate_type: Option<String>,
    #[serde(default)]
    managed: ManagedSection,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedSection {
    #[serde(default)]
    domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    domain_status: BTreeMap<String, String>,
}

impl From<SslCertificateResource> for ExternalCertificate {
    fn from(resource: SslCertificateResource) -> Self {
        ExternalCertificate {
            name: resource.name,
            description: resource.description,
            domains: resource.managed.domains,
            status: ProviderStatus::parse(resource.managed.status.as_deref().unwrap_or_default()),
            domain_status: resource.managed.domain_status,
        }
    }
}

/// HTTP client for the provider's certificate collection.
#[derive(Clone)]
pub struct HttpCertificateProvider {
    http: HttpClient,
    collection_url: String,
    token: Option<String>,
}

impl HttpCertificateProvider {
    /// Create a provider client.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - API base URL, e.g. `https://compute.googleapis.com/compute/v1`
    /// * `project` - Project owning the certificates
    /// * `token` - Optional bearer token
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn new(
        endpoint: &str,
        project: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base = Url::parse(endpoint)
            .with_context(|| format!("invalid provider endpoint '{endpoint}'"))?;
        if project.is_empty() {
            anyhow::bail!("provider project must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build provider HTTP client")?;

        let collection_url = format!(
            "{}/projects/{}/global/sslCertificates",
            base.as_str().trim_end_matches('/'),
            project
        );

        Ok(Self {
            http,
            collection_url,
            token,
        })
    }

    fn item_url(&self, name: &str) -> String {
        format!("{}/{}", self.collection_url, name)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn create(
        &self,
        name: &str,
        domains: &[String],
        description: &str,
    ) -> Result<(), ProviderError> {
        let body = SslCertificateResource {
            name: name.to_string(),
            description: description.to_string(),
            certificate_type: Some(MANAGED_CERTIFICATE_TYPE.to_string()),
            managed: ManagedSection {
                domains: domains.to_vec(),
                ..ManagedSection::default()
            },
        };

        let response = self
            .authorize(self.http.post(&self.collection_url).json(&body))
            .send()
            .await
            .map_err(|e| transport_error(name, &e))?;

        let status = response.status();
        if status.is_success() {
            info!(certificate = name, domains = ?domains, "Created external certificate");
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(status_error(name, status, message))
    }

    async fn update(&self, name: &str, domains: &[String]) -> Result<(), ProviderError> {
        let body = serde_json::json!({ "managed": { "domains": domains } });

        let response = self
            .authorize(self.http.patch(self.item_url(name)).json(&body))
            .send()
            .await
            .map_err(|e| transport_error(name, &e))?;

        let status = response.status();
        if status.is_success() {
            info!(certificate = name, domains = ?domains, "Updated external certificate domains");
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(status_error(name, status, message))
    }
}

#[async_trait]
impl CertificateProvider for HttpCertificateProvider {
    async fn get(&self, name: &str) -> Result<Option<ExternalCertificate>, ProviderError> {
        let response = self
            .authorize(self.http.get(self.item_url(name)))
            .send()
            .await
            .map_err(|e| transport_error(name, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(certificate = name, "External certificate not found");
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(name, status, message));
        }

        let resource: SslCertificateResource =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;

        Ok(Some(resource.into()))
    }

    async fn ensure_exists(
        &self,
        name: &str,
        domains: &[String],
        description: &str,
    ) -> Result<(), ProviderError> {
        match self.get(name).await? {
            Some(existing) if existing.has_domains(domains) => {
                debug!(certificate = name, "External certificate already up to date");
                Ok(())
            }
            Some(_) => self.update(name, domains).await,
            None => match self.create(name, domains, description).await {
                // Lost a race with another writer (or our own earlier attempt):
                // accept the existing certificate if it already matches.
                Err(ProviderError::Conflict { .. }) => match self.get(name).await? {
                    Some(existing) if existing.has_domains(domains) => Ok(()),
                    Some(_) => self.update(name, domains).await,
                    None => Err(ProviderError::Conflict {
                        name: name.to_string(),
                    }),
                },
                other => other,
            },
        }
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        let response = self
            .authorize(self.http.delete(self.item_url(name)))
            .send()
            .await
            .map_err(|e| transport_error(name, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(certificate = name, "External certificate already deleted");
            return Ok(());
        }
        if status.is_success() {
            info!(certificate = name, "Deleted external certificate");
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(status_error(name, status, message))
    }
}

/// Map a non-success HTTP status to a provider error.
fn status_error(name: &str, status: StatusCode, message: String) -> ProviderError {
    let name = name.to_string();
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { name },
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => ProviderError::Conflict { name },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderError::Timeout { name }
        }
        s if s.is_server_error() => ProviderError::Unavailable {
            name,
            reason: format!("HTTP {}: {message}", s.as_u16()),
        },
        s => ProviderError::Rejected {
            name,
            status: s.as_u16(),
            message,
        },
    }
}

/// Map a transport failure to a provider error.
fn transport_error(name: &str, err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            name: name.to_string(),
        }
    } else {
        ProviderError::Unavailable {
            name: name.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
