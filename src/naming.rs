// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Stable names for external certificates.
//!
//! The external certificate name is a pure function of the `CertificateRequest`
//! identity (namespace and name). A controller that crashes after creating the
//! external certificate but before recording the name in status computes the
//! same name on restart, so the create is repeated idempotently instead of
//! leaking a second certificate.
//!
//! Generated names look like `cert-<name>-<hash>`:
//!
//! - `<name>` is the sanitized `CertificateRequest` name, truncated so the
//!   whole name fits in 63 characters
//! - `<hash>` is the first 16 hex characters of SHA-256 over `namespace/name`,
//!   which keeps names unique across namespaces and after truncation

use crate::constants::{
    EXTERNAL_CERT_HASH_LEN, EXTERNAL_CERT_NAME_MAX_LEN, EXTERNAL_CERT_NAME_PREFIX,
};
use sha2::{Digest, Sha256};

/// Prefix of the owner tag stamped into the external certificate description
pub const OWNER_TAG_PREFIX: &str = "managed-certs:";

/// Generate the external certificate name for a `CertificateRequest`.
///
/// # Example
///
/// ```rust
/// use managed_certs::naming::external_certificate_name;
///
/// let name = external_certificate_name("ns", "foo");
/// assert!(name.starts_with("cert-foo-"));
/// assert_eq!(name, external_certificate_name("ns", "foo"));
/// assert_ne!(name, external_certificate_name("other", "foo"));
/// ```
#[must_use]
pub fn external_certificate_name(namespace: &str, name: &str) -> String {
    let hash = identity_hash(namespace, name);

    // cert-<prefix>-<hash>
    let budget = EXTERNAL_CERT_NAME_MAX_LEN - EXTERNAL_CERT_NAME_PREFIX.len() - hash.len() - 2;
    let prefix = sanitize(name, budget);

    if prefix.is_empty() {
        format!("{EXTERNAL_CERT_NAME_PREFIX}-{hash}")
    } else {
        format!("{EXTERNAL_CERT_NAME_PREFIX}-{prefix}-{hash}")
    }
}

/// Owner tag written to the description of every external certificate the
/// controller creates for `namespace/name`.
#[must_use]
pub fn owner_tag(namespace: &str, name: &str) -> String {
    format!("{OWNER_TAG_PREFIX}{namespace}/{name}")
}

fn identity_hash(namespace: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"/");
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..EXTERNAL_CERT_HASH_LEN].to_string()
}

/// Lowercase, map anything outside `[a-z0-9-]` to `-`, truncate to `max_len`
/// and strip dashes at the edges.
fn sanitize(name: &str, max_len: usize) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .take(max_len)
        .collect();

    mapped.trim_matches('-').to_string()
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod naming_tests;
