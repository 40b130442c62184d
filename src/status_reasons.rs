// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition and event reasons for `CertificateRequest` resources.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a
//! condition has a particular status, or why an event was recorded.
//!
//! # Condition Types
//!
//! A `CertificateRequest` carries a single `type: Ready` condition mirroring
//! its phase:
//!
//! | Phase          | Ready   | Reason                                   |
//! |----------------|---------|------------------------------------------|
//! | `Provisioning` | `False` | `Provisioning`                           |
//! | `Active`       | `True`  | `CertificateActive`                      |
//! | `Renewing`     | `True`  | `Renewing`                               |
//! | `Failed`       | `False` | `ProvisioningFailed`, `InvalidDomains`, ... |
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   phase: Active
//!   certificateName: cert-foo-3f2a9c0d1e4b5a69
//!   providerStatus: ACTIVE
//!   conditions:
//!     - type: Ready
//!       status: "True"
//!       reason: CertificateActive
//!       message: "Certificate serves all 2 domains"
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Encompassing readiness condition.
pub const CONDITION_TYPE_READY: &str = "Ready";

// ============================================================================
// Condition Reasons
// ============================================================================

/// The external certificate serves every requested domain.
pub const REASON_CERTIFICATE_ACTIVE: &str = "CertificateActive";

/// The external certificate exists but is not serving yet.
pub const REASON_PROVISIONING: &str = "Provisioning";

/// The certificate serves, but the provider failed to renew it and retries.
pub const REASON_RENEWING: &str = "Renewing";

/// The provider gave up provisioning the certificate.
pub const REASON_PROVISIONING_FAILED: &str = "ProvisioningFailed";

/// `spec.domains` cannot be turned into a managed certificate.
pub const REASON_INVALID_DOMAINS: &str = "InvalidDomains";

/// An external certificate with the generated name belongs to someone else.
pub const REASON_NOT_OWNED: &str = "CertificateNotOwned";

/// The provider refused a request that will not succeed unchanged.
pub const REASON_PROVIDER_REJECTED: &str = "ProviderRejected";

// ============================================================================
// Event Reasons
// ============================================================================

pub const EVENT_REASON_CERTIFICATE_CREATED: &str = "CertificateCreated";
pub const EVENT_REASON_CERTIFICATE_UPDATED: &str = "CertificateUpdated";
pub const EVENT_REASON_CERTIFICATE_DELETED: &str = "CertificateDeleted";
pub const EVENT_REASON_PHASE_CHANGED: &str = "PhaseChanged";
pub const EVENT_REASON_ATTACHED: &str = "AttachedToIngress";
pub const EVENT_REASON_DETACHED: &str = "DetachedFromIngress";
pub const EVENT_REASON_RECONCILE_FAILED: &str = "ReconcileFailed";

/// Event action recorded alongside every event.
pub const EVENT_ACTION_RECONCILING: &str = "Reconciling";
