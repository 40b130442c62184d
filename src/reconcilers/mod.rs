// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation logic for `CertificateRequest` resources.
//!
//! # Reconciliation Architecture
//!
//! The controller follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - `CertificateRequest` and `Ingress` changes become reconcile keys
//! 2. **Reconcile** - compare the spec with the external certificate and ingresses
//! 3. **Update** - create, update or delete the external certificate and
//!    rewrite ingress annotations
//! 4. **Status** - report the phase back onto the `CertificateRequest`
//!
//! # Example: Using the Reconciler
//!
//! ```rust,ignore
//! use managed_certs::reconcilers::{reconcile_certificate_request, ReconcileAction};
//!
//! match reconcile_certificate_request(&ctx, &key).await? {
//!     ReconcileAction::Done => queue.forget(&key),
//!     ReconcileAction::RequeueAfter(delay) => queue.add_after(key.clone(), delay),
//! }
//! ```

pub mod certificate;
pub mod finalizers;
pub mod status;
pub mod validation;

pub use certificate::reconcile_certificate_request;

use std::time::Duration;

/// What the worker should do with a key after a successful reconcile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Converged. The key is processed again on the next watch event.
    Done,
    /// Converged as far as possible for now; look again after the delay.
    RequeueAfter(Duration),
}
