// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the managed certificate controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `CertificateRequest` CRD
pub const API_GROUP: &str = "certs.firestoned.io";

/// API version for the `CertificateRequest` CRD
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "certs.firestoned.io/v1alpha1";

/// Kind name for `CertificateRequest` resource
pub const KIND_CERTIFICATE_REQUEST: &str = "CertificateRequest";

/// Finalizer that blocks removal of a `CertificateRequest` until its external
/// certificate has been torn down
pub const CERTIFICATE_REQUEST_FINALIZER: &str = "certs.firestoned.io/finalizer";

/// Field manager used for all writes made by the controller
pub const FIELD_MANAGER: &str = "managed-certs-controller";

// ============================================================================
// Ingress Annotation Constants
// ============================================================================

/// Annotation (user-owned) listing the `CertificateRequest` names an ingress wants
pub const MANAGED_CERTIFICATES_ANNOTATION: &str = "networking.gke.io/managed-certificates";

/// Annotation (controller-owned) listing the external certificate names attached
/// to an ingress
pub const PRE_SHARED_CERT_ANNOTATION: &str = "ingress.gcp.kubernetes.io/pre-shared-cert";

/// Separator for annotation list values
pub const ANNOTATION_LIST_SEPARATOR: char = ',';

// ============================================================================
// External Certificate Naming Constants
// ============================================================================

/// Prefix of every generated external certificate name
pub const EXTERNAL_CERT_NAME_PREFIX: &str = "cert";

/// Maximum length of a provider resource name
pub const EXTERNAL_CERT_NAME_MAX_LEN: usize = 63;

/// Number of hex characters of the identity hash kept in generated names
pub const EXTERNAL_CERT_HASH_LEN: usize = 16;

/// Maximum number of domains on a single certificate
pub const MAX_DOMAINS_PER_CERTIFICATE: usize = 100;

/// Maximum length of a fully qualified domain name
pub const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single DNS label
pub const MAX_DNS_LABEL_LEN: usize = 63;

// ============================================================================
// Reconciliation Constants
// ============================================================================

/// Default number of reconcile workers
pub const DEFAULT_WORKERS: usize = 2;

/// How often a certificate that is still provisioning is re-polled (30 seconds)
pub const DEFAULT_PROVIDER_POLL_INTERVAL_SECS: u64 = 30;

/// Initial requeue delay after a transient failure (100ms)
pub const DEFAULT_BACKOFF_BASE_MILLIS: u64 = 100;

/// Ceiling of the requeue delay after repeated transient failures (5 minutes)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Capacity of the watch-event channel feeding the work queue
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ============================================================================
// External Provider Constants
// ============================================================================

/// Default provider API endpoint
pub const DEFAULT_PROVIDER_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Default timeout for a single provider request (30 seconds)
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default lease name used for leader election
pub const DEFAULT_LEASE_NAME: &str = "managed-certs-controller-leader";

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default grace period before a lease is considered lost (5 seconds)
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 5;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
