// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer helpers for Kubernetes resources.
//!
//! Deletion of a `CertificateRequest` is two-phase: the API server only sets
//! `deletionTimestamp` while our finalizer is present, the reconciler tears
//! down the external certificate, and removing the finalizer lets the object
//! go. The helpers here compute finalizer lists and the merge patch that
//! writes them; the store performs the actual API call.
//!
//! # Example
//!
//! ```rust,ignore
//! use managed_certs::reconcilers::finalizers::{finalizer_patch, with_finalizer};
//!
//! if let Some(finalizers) = with_finalizer(&obj, FINALIZER) {
//!     let patch = finalizer_patch(&finalizers, obj.resource_version().as_deref());
//!     api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
//! }
//! ```

use kube::{Resource, ResourceExt};
use serde_json::{json, Value};

/// Whether `resource` carries `finalizer`.
#[must_use]
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Whether the API server has started deleting `resource`.
#[must_use]
pub fn is_deleting<T: Resource>(resource: &T) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

/// Finalizer list with `finalizer` appended, or `None` if it is already present.
#[must_use]
pub fn with_finalizer<T: Resource>(resource: &T, finalizer: &str) -> Option<Vec<String>> {
    if has_finalizer(resource, finalizer) {
        return None;
    }
    let mut finalizers = resource.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    Some(finalizers)
}

/// Finalizer list without `finalizer`, or `None` if it is absent.
#[must_use]
pub fn without_finalizer<T: Resource>(resource: &T, finalizer: &str) -> Option<Vec<String>> {
    if !has_finalizer(resource, finalizer) {
        return None;
    }
    let mut finalizers = resource.finalizers().to_vec();
    finalizers.retain(|f| f != finalizer);
    Some(finalizers)
}

/// JSON merge patch replacing the finalizer list.
///
/// With a `resource_version` the API server rejects the patch with 409 if the
/// object changed since it was read, so a concurrent finalizer edit by another
/// controller is never lost.
#[must_use]
pub fn finalizer_patch(finalizers: &[String], resource_version: Option<&str>) -> Value {
    match resource_version {
        Some(rv) => json!({ "metadata": { "finalizers": finalizers, "resourceVersion": rv } }),
        None => json!({ "metadata": { "finalizers": finalizers } }),
    }
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
