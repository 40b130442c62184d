// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # managed-certs - Managed TLS Certificate Controller for Kubernetes
//!
//! A Kubernetes controller that keeps cloud-managed TLS certificates in sync
//! with `CertificateRequest` custom resources and attaches them to the
//! ingresses that ask for them.
//!
//! ## Overview
//!
//! - A user creates a `CertificateRequest` listing domains
//! - The controller creates an external managed certificate for those domains,
//!   tracks its provisioning and mirrors the result into the request's status
//! - Ingresses opt in with the `networking.gke.io/managed-certificates`
//!   annotation; the controller writes the external certificate name into
//!   `ingress.gcp.kubernetes.io/pre-shared-cert`
//! - Deleting the request removes the external certificate and every
//!   ingress reference to it
//!
//! ## Modules
//!
//! - [`crd`] - `CertificateRequest` custom resource types
//! - [`reconcilers`] - Reconciliation logic
//! - [`queue`] - Deduplicating work queue with per-key backoff
//! - [`controller`] - Watch feeds and worker loop
//! - [`leader`] - Leader election gate
//! - [`ingress`] - Ingress annotation binder
//! - [`provider`] - External certificate API client
//! - [`store`] - `CertificateRequest` cache and writer
//!
//! ## Example
//!
//! ```rust,no_run
//! use managed_certs::naming::external_certificate_name;
//!
//! let name = external_certificate_name("team-a", "storefront");
//! assert!(name.starts_with("cert-storefront-"));
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod events;
pub mod ingress;
pub mod leader;
pub mod metrics;
pub mod naming;
pub mod provider;
pub mod queue;
pub mod reconcilers;
pub mod server;
pub mod status_reasons;
pub mod store;

#[cfg(test)]
pub mod testing;
