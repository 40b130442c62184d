// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status helpers for `CertificateRequest` resources.
//!
//! - mapping of provider statuses onto [`CertificatePhase`]
//! - the phase state machine (`Failed` never jumps straight to `Active`)
//! - the `Ready` condition mirroring the phase
//! - change detection that ignores condition timestamps, so an unchanged
//!   reconcile never writes status
//!
//! # Example
//!
//! ```rust,no_run
//! use managed_certs::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "Ready",
//!     "True",
//!     "CertificateActive",
//!     "Certificate serves all 1 domains",
//! );
//! ```

use crate::crd::{CertificatePhase, CertificateRequestStatus, Condition};
use crate::provider::ProviderStatus;
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_CERTIFICATE_ACTIVE, REASON_PROVISIONING, REASON_RENEWING,
};
use chrono::Utc;

/// Create a new Kubernetes condition with the current timestamp.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Build the `Ready` condition for a phase.
///
/// `last_transition_time` is carried over from `existing` when the condition
/// status does not flip.
#[must_use]
pub fn ready_condition(
    phase: CertificatePhase,
    reason: &str,
    message: &str,
    existing: &[Condition],
) -> Condition {
    let status = match phase {
        CertificatePhase::Active | CertificatePhase::Renewing => "True",
        CertificatePhase::Provisioning | CertificatePhase::Failed => "False",
    };

    let mut condition = create_condition(CONDITION_TYPE_READY, status, reason, message);
    if let Some(previous) = find_condition(existing, CONDITION_TYPE_READY) {
        if previous.status == status && previous.last_transition_time.is_some() {
            condition
                .last_transition_time
                .clone_from(&previous.last_transition_time);
        }
    }
    condition
}

/// Default `Ready` reason for a non-failed phase.
#[must_use]
pub fn phase_reason(phase: CertificatePhase) -> &'static str {
    match phase {
        CertificatePhase::Active => REASON_CERTIFICATE_ACTIVE,
        CertificatePhase::Renewing => REASON_RENEWING,
        CertificatePhase::Provisioning | CertificatePhase::Failed => REASON_PROVISIONING,
    }
}

/// Map a provider status onto a phase.
///
/// | Provider status                                   | Phase          |
/// |---------------------------------------------------|----------------|
/// | `PROVISIONING`, `MANAGED_CERTIFICATE_STATUS_UNSPECIFIED` | `Provisioning` |
/// | `ACTIVE`                                          | `Active`       |
/// | `PROVISIONING_FAILED`, `PROVISIONING_FAILED_PERMANENTLY` | `Failed` |
/// | `RENEWAL_FAILED`                                  | `Renewing`     |
///
/// Unknown statuses keep the certificate in `Provisioning` so it is polled again.
#[must_use]
pub fn phase_for_provider_status(status: &ProviderStatus) -> CertificatePhase {
    match status {
        ProviderStatus::Active => CertificatePhase::Active,
        ProviderStatus::ProvisioningFailed | ProviderStatus::ProvisioningFailedPermanently => {
            CertificatePhase::Failed
        }
        ProviderStatus::RenewalFailed => CertificatePhase::Renewing,
        ProviderStatus::Provisioning | ProviderStatus::Unspecified | ProviderStatus::Other(_) => {
            CertificatePhase::Provisioning
        }
    }
}

/// Next phase given the current one and what the provider reports.
///
/// A create or domain update this round forces `Provisioning`, and a
/// `Failed` request passes through `Provisioning` before it can be `Active`.
#[must_use]
pub fn next_phase(
    current: Option<CertificatePhase>,
    observed: CertificatePhase,
    domains_changed: bool,
) -> CertificatePhase {
    if domains_changed {
        return CertificatePhase::Provisioning;
    }
    match (current, observed) {
        (Some(CertificatePhase::Failed), CertificatePhase::Active) => {
            CertificatePhase::Provisioning
        }
        _ => observed,
    }
}

fn without_timestamps(status: &CertificateRequestStatus) -> CertificateRequestStatus {
    let mut status = status.clone();
    for condition in &mut status.conditions {
        condition.last_transition_time = None;
    }
    status
}

/// Whether writing `desired` would change anything, ignoring condition timestamps.
#[must_use]
pub fn status_changed(
    current: Option<&CertificateRequestStatus>,
    desired: &CertificateRequestStatus,
) -> bool {
    match current {
        Some(current) => without_timestamps(current) != without_timestamps(desired),
        None => true,
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
