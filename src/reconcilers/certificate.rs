// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `CertificateRequest` reconciliation logic.
//!
//! One reconcile converges a single key:
//!
//! 1. **Gone** - the object left the cache: detach its certificate from every
//!    ingress and delete the external certificate (missing is fine). A key
//!    never seen alive with nothing attached is skipped.
//! 2. **Deleting** - same teardown, then drop the finalizer. The finalizer
//!    stays until teardown succeeds, so the object never disappears while the
//!    external certificate still exists.
//! 3. **Live** - add the finalizer, validate domains, create or update the
//!    external certificate only when it is missing or its domains differ,
//!    read back its status, map it to a phase, attach to or detach from
//!    ingresses, and write status only if something changed.
//!
//! Every step is idempotent, so a reconcile interrupted at any point (crash,
//! lost leadership, transient error) is simply run again from the top.

use super::finalizers::{has_finalizer, is_deleting};
use super::status::{
    next_phase, phase_for_provider_status, phase_reason, ready_condition, status_changed,
};
use super::validation::validate_domains;
use super::ReconcileAction;
use crate::constants::CERTIFICATE_REQUEST_FINALIZER;
use crate::context::{certificate_name_of, Context};
use crate::crd::{CertificatePhase, CertificateRequest, CertificateRequestStatus, DomainStatus};
use crate::errors::{is_not_found, Error, ProviderError};
use crate::ingress;
use crate::metrics;
use crate::naming::{external_certificate_name, owner_tag};
use crate::provider::ExternalCertificate;
use crate::status_reasons::{
    EVENT_ACTION_RECONCILING, EVENT_REASON_ATTACHED, EVENT_REASON_CERTIFICATE_CREATED,
    EVENT_REASON_CERTIFICATE_DELETED, EVENT_REASON_CERTIFICATE_UPDATED, EVENT_REASON_DETACHED,
    EVENT_REASON_PHASE_CHANGED, EVENT_REASON_RECONCILE_FAILED, REASON_INVALID_DOMAINS,
    REASON_NOT_OWNED, REASON_PROVIDER_REJECTED, REASON_PROVISIONING_FAILED,
};
use crate::store::ReconcileKey;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

/// Reconcile the `CertificateRequest` identified by `key`.
///
/// # Returns
///
/// * `Ok(ReconcileAction::Done)` - converged; wait for the next change
/// * `Ok(ReconcileAction::RequeueAfter(d))` - the provider is still working; poll again
/// * `Err(e)` - retry with backoff if `e.is_retryable()`. Permanent errors have
///   already been recorded as `Failed` status before returning. Teardown
///   failures are always retryable.
///
/// # Errors
///
/// Returns provider, Kubernetes and validation errors.
pub async fn reconcile_certificate_request(
    ctx: &Context,
    key: &ReconcileKey,
) -> Result<ReconcileAction, Error> {
    let Some(cached) = ctx.certificates.get(key) else {
        let cert_name = external_certificate_name(&key.namespace, &key.name);
        if !ctx.known.contains(key) && !attached_anywhere(ctx, &cert_name) {
            debug!(key = %key, "Unknown CertificateRequest with nothing attached, skipping teardown");
            return Ok(ReconcileAction::Done);
        }
        debug!(key = %key, "CertificateRequest not in cache, tearing down");
        teardown(ctx, key, &cert_name, None)
            .await
            .map_err(|e| Error::teardown(&cert_name, e))?;
        ctx.known.forget(key);
        return Ok(ReconcileAction::Done);
    };
    let obj = cached.as_ref().clone();

    if is_deleting(&obj) {
        if has_finalizer(&obj, CERTIFICATE_REQUEST_FINALIZER) {
            let cert_name = certificate_name_of(&obj);
            info!(key = %key, "CertificateRequest is being deleted, running teardown");
            teardown(ctx, key, &cert_name, Some(&obj))
                .await
                .map_err(|e| Error::teardown(&cert_name, e))?;
            ctx.certificates
                .remove_finalizer(&obj)
                .await
                .map_err(|e| Error::teardown(&cert_name, e.into()))?;
            ctx.known.forget(key);
            info!(key = %key, "Teardown complete, finalizer removed");
        }
        return Ok(ReconcileAction::Done);
    }

    ctx.known.observe(key);
    let obj = ctx.certificates.add_finalizer(&obj).await?;

    match converge(ctx, key, &obj).await {
        Err(e) if !e.is_retryable() => {
            record_permanent_failure(ctx, &obj, &e).await?;
            Err(e)
        }
        result => result,
    }
}

/// Drive the external certificate and ingresses towards the spec of a live object.
async fn converge(
    ctx: &Context,
    key: &ReconcileKey,
    obj: &CertificateRequest,
) -> Result<ReconcileAction, Error> {
    let domains = validate_domains(&obj.spec.domains)?;
    let cert_name = certificate_name_of(obj);
    let owner = owner_tag(&key.namespace, &key.name);

    let existing = ctx.provider.get(&cert_name).await?;
    if let Some(existing) = &existing {
        if existing.description != owner {
            return Err(Error::NotOwned {
                name: cert_name,
                owner: existing.description.clone(),
            });
        }
    }

    let domains_changed = match &existing {
        None => {
            ctx.provider
                .ensure_exists(&cert_name, &domains, &owner)
                .await?;
            metrics::record_external_certificate_operation("create");
            info!(key = %key, certificate = %cert_name, domains = ?domains, "Created external certificate");
            publish(
                ctx,
                obj,
                EventType::Normal,
                EVENT_REASON_CERTIFICATE_CREATED,
                format!("Created certificate {cert_name} for {}", domains.join(", ")),
            )
            .await;
            true
        }
        Some(current) if !current.has_domains(&domains) => {
            ctx.provider
                .ensure_exists(&cert_name, &domains, &owner)
                .await?;
            metrics::record_external_certificate_operation("update");
            info!(key = %key, certificate = %cert_name, domains = ?domains, "Updated external certificate domains");
            publish(
                ctx,
                obj,
                EventType::Normal,
                EVENT_REASON_CERTIFICATE_UPDATED,
                format!("Updated certificate {cert_name} to {}", domains.join(", ")),
            )
            .await;
            true
        }
        Some(_) => false,
    };

    let observed = if domains_changed {
        ctx.provider
            .get(&cert_name)
            .await?
            .ok_or_else(|| Error::NotYetVisible {
                name: cert_name.clone(),
            })?
    } else {
        existing.ok_or_else(|| Error::NotYetVisible {
            name: cert_name.clone(),
        })?
    };

    let current_phase = obj.phase();
    let phase = next_phase(
        current_phase,
        phase_for_provider_status(&observed.status),
        domains_changed,
    );

    let attached = sync_ingresses(ctx, obj, &cert_name, phase.is_attachable()).await?;

    let (reason, message) = match phase {
        CertificatePhase::Failed => (
            REASON_PROVISIONING_FAILED,
            format!("Provider reported {}", observed.status),
        ),
        CertificatePhase::Active => (
            phase_reason(phase),
            format!("Certificate serves all {} domains", domains.len()),
        ),
        CertificatePhase::Provisioning | CertificatePhase::Renewing => (
            phase_reason(phase),
            format!("Provider reports {}", observed.status),
        ),
    };

    let existing_status = obj.status.clone().unwrap_or_default();
    let desired = CertificateRequestStatus {
        phase: Some(phase),
        certificate_name: Some(cert_name.clone()),
        provider_status: Some(observed.status.to_string()),
        domain_status: domain_status(&observed),
        attached_ingresses: attached,
        observed_generation: obj.metadata.generation,
        message: (phase == CertificatePhase::Failed).then(|| message.clone()),
        conditions: vec![ready_condition(
            phase,
            reason,
            &message,
            &existing_status.conditions,
        )],
    };

    write_status(ctx, obj, &desired).await?;

    if current_phase != Some(phase) {
        let type_ = if phase == CertificatePhase::Failed {
            EventType::Warning
        } else {
            EventType::Normal
        };
        let from = current_phase.map_or_else(|| "None".to_string(), |p| p.to_string());
        info!(key = %key, from = %from, to = %phase, "CertificateRequest phase changed");
        publish(
            ctx,
            obj,
            type_,
            EVENT_REASON_PHASE_CHANGED,
            format!("{from} -> {phase}: {message}"),
        )
        .await;
    }

    if phase.needs_polling() {
        Ok(ReconcileAction::RequeueAfter(ctx.config.poll_interval))
    } else {
        Ok(ReconcileAction::Done)
    }
}

/// Attach `cert_name` to every ingress that should serve it and detach it
/// from every other ingress. Returns the `namespace/name` of attached ingresses.
///
/// Decisions are made on the cached ingress; writes go to a fresh read so a
/// stale cache never overwrites someone else's change.
async fn sync_ingresses(
    ctx: &Context,
    obj: &CertificateRequest,
    cert_name: &str,
    attachable: bool,
) -> Result<Vec<String>, Error> {
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let wants = |ing: &k8s_openapi::api::networking::v1::Ingress| {
        attachable
            && ing.namespace().as_deref() == Some(namespace.as_str())
            && ingress::requests(ing, &name)
    };

    let mut attached = Vec::new();
    for cached in ctx.ingresses.list() {
        let should = wants(&cached);
        if should == ingress::is_attached(&cached, cert_name) {
            if should {
                attached.push(ingress::ingress_id(&cached));
            }
            continue;
        }

        let ing_namespace = cached.namespace().unwrap_or_default();
        let Some(mut fresh) = ctx.ingresses.get(&ing_namespace, &cached.name_any()).await? else {
            continue;
        };
        let should = wants(&fresh);
        let id = ingress::ingress_id(&fresh);

        if should {
            if ingress::attach(&mut fresh, cert_name) {
                if !update_ingress(ctx, &fresh).await? {
                    continue;
                }
                metrics::record_ingress_update("attach");
                info!(ingress = %id, certificate = %cert_name, "Attached certificate to ingress");
                publish(
                    ctx,
                    obj,
                    EventType::Normal,
                    EVENT_REASON_ATTACHED,
                    format!("Attached {cert_name} to ingress {id}"),
                )
                .await;
            }
            attached.push(id);
        } else if ingress::detach(&mut fresh, cert_name) {
            if !update_ingress(ctx, &fresh).await? {
                continue;
            }
            metrics::record_ingress_update("detach");
            info!(ingress = %id, certificate = %cert_name, "Detached certificate from ingress");
            publish(
                ctx,
                obj,
                EventType::Normal,
                EVENT_REASON_DETACHED,
                format!("Detached {cert_name} from ingress {id}"),
            )
            .await;
        }
    }

    attached.sort();
    attached.dedup();
    Ok(attached)
}

/// Remove `cert_name` from every ingress, then delete the external certificate.
///
/// A certificate whose owner tag does not match `key` is left alone.
async fn teardown(
    ctx: &Context,
    key: &ReconcileKey,
    cert_name: &str,
    obj: Option<&CertificateRequest>,
) -> Result<(), Error> {
    for cached in ctx.ingresses.list() {
        if !ingress::is_attached(&cached, cert_name) {
            continue;
        }
        let ing_namespace = cached.namespace().unwrap_or_default();
        let Some(mut fresh) = ctx.ingresses.get(&ing_namespace, &cached.name_any()).await? else {
            continue;
        };
        if ingress::detach(&mut fresh, cert_name) && update_ingress(ctx, &fresh).await? {
            metrics::record_ingress_update("detach");
            info!(ingress = %ingress::ingress_id(&fresh), certificate = %cert_name, "Detached certificate from ingress");
        }
    }

    let Some(existing) = ctx.provider.get(cert_name).await? else {
        debug!(key = %key, certificate = %cert_name, "External certificate already absent");
        return Ok(());
    };

    let owner = owner_tag(&key.namespace, &key.name);
    if existing.description != owner {
        warn!(
            key = %key,
            certificate = %cert_name,
            owner = %existing.description,
            "External certificate is not owned by this CertificateRequest, leaving it in place"
        );
        return Ok(());
    }

    ctx.provider.delete(cert_name).await?;
    metrics::record_external_certificate_operation("delete");
    info!(key = %key, certificate = %cert_name, "Deleted external certificate");
    if let Some(obj) = obj {
        publish(
            ctx,
            obj,
            EventType::Normal,
            EVENT_REASON_CERTIFICATE_DELETED,
            format!("Deleted certificate {cert_name}"),
        )
        .await;
    }
    Ok(())
}

/// Replace an ingress. Returns `false` if it was deleted after the fresh read.
async fn update_ingress(
    ctx: &Context,
    fresh: &k8s_openapi::api::networking::v1::Ingress,
) -> Result<bool, Error> {
    match ctx.ingresses.update(fresh).await {
        Ok(_) => Ok(true),
        Err(e) if is_not_found(&e) => {
            debug!(ingress = %ingress::ingress_id(fresh), "Ingress deleted before update, skipping");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn attached_anywhere(ctx: &Context, cert_name: &str) -> bool {
    ctx.ingresses
        .list()
        .iter()
        .any(|ing| ingress::is_attached(ing, cert_name))
}

/// Mark the object `Failed` after a permanent error and detach its certificate.
async fn record_permanent_failure(
    ctx: &Context,
    obj: &CertificateRequest,
    error: &Error,
) -> Result<(), Error> {
    let cert_name = certificate_name_of(obj);
    sync_ingresses(ctx, obj, &cert_name, false).await?;

    let reason = match error {
        Error::InvalidDomains { .. } => REASON_INVALID_DOMAINS,
        Error::NotOwned { .. } => REASON_NOT_OWNED,
        Error::Provider(ProviderError::Rejected { .. }) => REASON_PROVIDER_REJECTED,
        _ => REASON_PROVISIONING_FAILED,
    };
    let message = error.to_string();

    let mut desired = obj.status.clone().unwrap_or_default();
    desired.phase = Some(CertificatePhase::Failed);
    desired.certificate_name = Some(cert_name);
    desired.attached_ingresses = Vec::new();
    desired.observed_generation = obj.metadata.generation;
    desired.message = Some(message.clone());
    desired.conditions = vec![ready_condition(
        CertificatePhase::Failed,
        reason,
        &message,
        &desired.conditions,
    )];

    if write_status(ctx, obj, &desired).await? {
        warn!(key = %ReconcileKey::from_object(obj), reason, error = %message, "CertificateRequest failed permanently");
        publish(
            ctx,
            obj,
            EventType::Warning,
            EVENT_REASON_RECONCILE_FAILED,
            message,
        )
        .await;
    }
    Ok(())
}

/// Write `desired` if it differs from the object's status. Returns whether it wrote.
async fn write_status(
    ctx: &Context,
    obj: &CertificateRequest,
    desired: &CertificateRequestStatus,
) -> Result<bool, Error> {
    if !status_changed(obj.status.as_ref(), desired) {
        debug!(key = %ReconcileKey::from_object(obj), "Status unchanged, skipping update");
        return Ok(false);
    }
    ctx.certificates.update_status(obj, desired).await?;
    Ok(true)
}

fn domain_status(cert: &ExternalCertificate) -> Vec<DomainStatus> {
    cert.domain_status
        .iter()
        .map(|(domain, status)| DomainStatus {
            domain: domain.clone(),
            status: status.clone(),
        })
        .collect()
}

async fn publish(
    ctx: &Context,
    obj: &CertificateRequest,
    type_: EventType,
    reason: &str,
    note: String,
) {
    ctx.events
        .publish(
            &obj.object_ref(&()),
            type_,
            reason,
            EVENT_ACTION_RECONCILING,
            Some(note),
        )
        .await;
}

#[cfg(test)]
#[path = "certificate_tests.rs"]
mod certificate_tests;
