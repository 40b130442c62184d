// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the managed certificate controller.
//!
//! Every error knows whether it is worth retrying. The reconcile loop uses
//! [`Error::is_retryable`] to choose between a rate-limited requeue (transient
//! failures) and marking the `CertificateRequest` as `Failed` (permanent
//! failures that only a spec edit can fix).

use thiserror::Error;

/// Errors returned by the external certificate provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider throttled the request (HTTP 429).
    #[error("provider rate limited request for certificate '{name}'")]
    RateLimited {
        /// Certificate the request was about
        name: String,
    },

    /// The request timed out before the provider answered.
    #[error("provider request for certificate '{name}' timed out")]
    Timeout {
        /// Certificate the request was about
        name: String,
    },

    /// The provider could not be reached or returned a server error.
    #[error("provider unavailable for certificate '{name}': {reason}")]
    Unavailable {
        /// Certificate the request was about
        name: String,
        /// Transport error or HTTP status text
        reason: String,
    },

    /// Concurrent modification of the external certificate (HTTP 409/412).
    #[error("conflicting update of certificate '{name}'")]
    Conflict {
        /// Certificate the request was about
        name: String,
    },

    /// The provider refused the request (4xx other than 404/409/429).
    #[error("provider rejected request for certificate '{name}' (HTTP {status}): {message}")]
    Rejected {
        /// Certificate the request was about
        name: String,
        /// HTTP status code
        status: u16,
        /// Provider error message
        message: String,
    },

    /// The provider answered with a body that could not be decoded.
    #[error("invalid provider response for certificate '{name}': {reason}")]
    InvalidResponse {
        /// Certificate the request was about
        name: String,
        /// Decoding error
        reason: String,
    },
}

impl ProviderError {
    /// Whether the request may succeed if repeated unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Rejected { .. })
    }

    /// Short category used for metrics labels.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::Timeout { .. } => "timeout",
            ProviderError::Unavailable { .. } => "unavailable",
            ProviderError::Conflict { .. } => "conflict",
            ProviderError::Rejected { .. } => "rejected",
            ProviderError::InvalidResponse { .. } => "invalid_response",
        }
    }
}

/// Errors raised while reconciling a `CertificateRequest`.
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error (status update, finalizer patch, ingress update).
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// External certificate provider error.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The desired domain list is malformed.
    #[error("invalid domains: {reason}")]
    InvalidDomains {
        /// What is wrong with the domain list
        reason: String,
    },

    /// An external certificate with the generated name exists but was not
    /// created for this `CertificateRequest`.
    #[error("external certificate '{name}' is owned by '{owner}', refusing to adopt it")]
    NotOwned {
        /// External certificate name
        name: String,
        /// Owner recorded on the external certificate
        owner: String,
    },

    /// The certificate was just written but is not yet visible on read-back.
    #[error("external certificate '{name}' not visible yet after ensure")]
    NotYetVisible {
        /// External certificate name
        name: String,
    },

    /// Cleanup of a deleted `CertificateRequest` failed. Always retried, so
    /// the finalizer never outlives a pending external certificate.
    #[error("teardown of certificate '{name}' failed: {source}")]
    Teardown {
        /// External certificate name
        name: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Leader election backend failure.
    #[error("leader election failed: {0}")]
    LeaderElection(#[from] kube_lease_manager::LeaseManagerError),
}

impl Error {
    /// Wrap a cleanup failure for `name`.
    #[must_use]
    pub fn teardown(name: &str, source: Error) -> Self {
        Error::Teardown {
            name: name.to_string(),
            source: Box::new(source),
        }
    }

    /// Whether the failed reconcile should be retried with backoff.
    ///
    /// Permanent errors mark the object `Failed` and wait for the next edit.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) => is_retryable_kube_error(e),
            Error::Provider(e) => e.is_retryable(),
            Error::InvalidDomains { .. } | Error::NotOwned { .. } => false,
            Error::NotYetVisible { .. } | Error::Teardown { .. } | Error::LeaderElection(_) => {
                true
            }
        }
    }

    /// Short category used for metrics labels.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Error::Kube(kube::Error::Api(e)) if e.code == 409 => "conflict",
            Error::Kube(_) => "api_error",
            Error::Provider(e) => e.category(),
            Error::InvalidDomains { .. } => "validation_error",
            Error::NotOwned { .. } => "not_owned",
            Error::NotYetVisible { .. } => "not_visible",
            Error::Teardown { .. } => "teardown",
            Error::LeaderElection(_) => "leader_election",
        }
    }
}

/// Determine if a Kubernetes error is retryable.
///
/// # Non-Retryable Errors
///
/// - **HTTP 400** (Bad Request) and **HTTP 422** (Invalid) - the object we
///   tried to write was rejected; repeating the same write cannot succeed
///
/// # Retryable Errors
///
/// Everything else: conflicts (409), rate limiting (429), server errors (5xx),
/// objects that vanished underneath us (404), missing permissions (403) that
/// an RBAC fix resolves, and every transport or decoding failure.
#[must_use]
pub fn is_retryable_kube_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => !matches!(api_err.code, 400 | 422),
        _ => true,
    }
}

/// Whether a Kubernetes error means the object is gone.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(api_err) if api_err.code == 404)
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
