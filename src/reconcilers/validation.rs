// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validation of `CertificateRequest` domain lists.
//!
//! Managed certificates cover fully qualified DNS names only: no wildcards and
//! no IP literals. A list that fails validation is a permanent error: the
//! request is marked `Failed` and waits for the user to edit it.

use crate::constants::{MAX_DNS_LABEL_LEN, MAX_DOMAINS_PER_CERTIFICATE, MAX_DOMAIN_LEN};
use crate::errors::Error;
use crate::provider::normalize_domains;
use std::net::IpAddr;

/// Validate `domains` and return them normalized (lowercase, sorted, unique).
///
/// # Errors
///
/// Returns [`Error::InvalidDomains`] naming the first offending entry.
pub fn validate_domains(domains: &[String]) -> Result<Vec<String>, Error> {
    let normalized = normalize_domains(domains);

    if normalized.is_empty() {
        return Err(invalid("at least one domain is required".to_string()));
    }
    if normalized.len() > MAX_DOMAINS_PER_CERTIFICATE {
        return Err(invalid(format!(
            "{} domains requested, at most {MAX_DOMAINS_PER_CERTIFICATE} are allowed",
            normalized.len()
        )));
    }

    for domain in &normalized {
        validate_domain(domain)?;
    }

    Ok(normalized)
}

fn validate_domain(domain: &str) -> Result<(), Error> {
    if domain.is_empty() {
        return Err(invalid("empty domain".to_string()));
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(invalid(format!(
            "domain '{domain}' is longer than {MAX_DOMAIN_LEN} characters"
        )));
    }
    if domain.contains('*') {
        return Err(invalid(format!(
            "wildcard domain '{domain}' is not supported"
        )));
    }
    if domain.parse::<IpAddr>().is_ok() {
        return Err(invalid(format!(
            "'{domain}' is an IP address, not a domain name"
        )));
    }
    if domain.ends_with('.') {
        return Err(invalid(format!(
            "domain '{domain}' must not end with a dot"
        )));
    }
    if !domain.contains('.') {
        return Err(invalid(format!(
            "domain '{domain}' is not fully qualified"
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(invalid(format!("domain '{domain}' has an empty label")));
        }
        if label.len() > MAX_DNS_LABEL_LEN {
            return Err(invalid(format!(
                "label '{label}' in '{domain}' is longer than {MAX_DNS_LABEL_LEN} characters"
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid(format!(
                "label '{label}' in '{domain}' must not start or end with '-'"
            )));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(invalid(format!(
                "label '{label}' in '{domain}' contains invalid characters"
            )));
        }
    }

    Ok(())
}

fn invalid(reason: String) -> Error {
    Error::InvalidDomains { reason }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
