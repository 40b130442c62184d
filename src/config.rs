// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration of the controller binary.
//!
//! Every flag can also be set through the environment variable named next to
//! it in `--help`, which is how the deployment manifests configure the pod.

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MILLIS, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_LEASE_DURATION_SECS,
    DEFAULT_LEASE_GRACE_SECS, DEFAULT_LEASE_NAME, DEFAULT_PROVIDER_ENDPOINT,
    DEFAULT_PROVIDER_POLL_INTERVAL_SECS, DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_WORKERS,
    METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT,
};
use crate::context::ReconcilerConfig;
use crate::leader::LeaseConfig;
use crate::queue::ItemBackoff;
use anyhow::{bail, Context as _, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Fallback identity when neither `--pod-name` nor `HOSTNAME` is set.
const DEFAULT_IDENTITY: &str = "managed-certs-controller";

/// Managed TLS certificate controller for Kubernetes ingresses.
#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct Config {
    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Number of concurrent reconcile workers
    #[arg(long, env = "MANAGED_CERTS_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Base URL of the certificate provider API
    #[arg(long, env = "PROVIDER_ENDPOINT", default_value = DEFAULT_PROVIDER_ENDPOINT)]
    pub provider_endpoint: String,

    /// Project that owns the external certificates
    #[arg(long, env = "PROVIDER_PROJECT")]
    pub project: String,

    /// Bearer token sent to the provider
    #[arg(long, env = "PROVIDER_TOKEN", hide_env_values = true)]
    pub provider_token: Option<String>,

    /// Timeout of a single provider request, in seconds
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value_t = DEFAULT_PROVIDER_TIMEOUT_SECS)]
    pub provider_timeout_secs: u64,

    /// How often a provisioning or renewing certificate is polled, in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = DEFAULT_PROVIDER_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,

    /// First retry delay after a transient failure, in milliseconds
    #[arg(long, env = "BACKOFF_BASE_MILLIS", default_value_t = DEFAULT_BACKOFF_BASE_MILLIS)]
    pub backoff_base_millis: u64,

    /// Ceiling of the retry delay, in seconds
    #[arg(long, env = "BACKOFF_MAX_SECS", default_value_t = DEFAULT_BACKOFF_MAX_SECS)]
    pub backoff_max_secs: u64,

    /// Name of the leader election lease
    #[arg(long, env = "LEASE_NAME", default_value = DEFAULT_LEASE_NAME)]
    pub lease_name: String,

    /// Namespace of the leader election lease
    #[arg(long, env = "POD_NAMESPACE", default_value = "default")]
    pub lease_namespace: String,

    /// Seconds a lease stays valid without renewal
    #[arg(long, env = "LEASE_DURATION_SECS", default_value_t = DEFAULT_LEASE_DURATION_SECS)]
    pub lease_duration_secs: u64,

    /// Seconds before expiry at which the lease is renewed
    #[arg(long, env = "LEASE_GRACE_SECS", default_value_t = DEFAULT_LEASE_GRACE_SECS)]
    pub lease_grace_secs: u64,

    /// Identity of this replica in the lease (defaults to `HOSTNAME`)
    #[arg(long, env = "POD_NAME")]
    pub pod_name: Option<String>,

    /// Address the metrics and health server binds to
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub metrics_bind_address: String,

    /// Port of the metrics and health server
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,

    /// Run without leader election (single replica only)
    #[arg(long, env = "DISABLE_LEADER_ELECTION")]
    pub disable_leader_election: bool,
}

impl Config {
    /// Reject combinations clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("--workers must be at least 1");
        }
        if self.project.trim().is_empty() {
            bail!("--project must not be empty");
        }
        if self.poll_interval_secs == 0 {
            bail!("--poll-interval-secs must be at least 1");
        }
        if self.provider_timeout_secs == 0 {
            bail!("--provider-timeout-secs must be at least 1");
        }
        if !self.disable_leader_election && self.lease_grace_secs >= self.lease_duration_secs {
            bail!(
                "--lease-grace-secs ({}) must be shorter than --lease-duration-secs ({})",
                self.lease_grace_secs,
                self.lease_duration_secs
            );
        }
        self.metrics_addr()?;
        Ok(())
    }

    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    #[must_use]
    pub fn backoff(&self) -> ItemBackoff {
        ItemBackoff::new(
            Duration::from_millis(self.backoff_base_millis),
            Duration::from_secs(self.backoff_max_secs),
        )
    }

    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Lease identity: `--pod-name`, then `HOSTNAME`, then a fixed fallback.
    #[must_use]
    pub fn identity(&self) -> String {
        self.pod_name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| DEFAULT_IDENTITY.to_string())
    }

    #[must_use]
    pub fn lease_config(&self) -> LeaseConfig {
        LeaseConfig {
            lease_name: self.lease_name.clone(),
            namespace: self.lease_namespace.clone(),
            identity: self.identity(),
            duration_secs: self.lease_duration_secs,
            grace_secs: self.lease_grace_secs,
        }
    }

    /// Socket address of the metrics and health server.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is not an IP address.
    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        let ip = self
            .metrics_bind_address
            .parse()
            .with_context(|| format!("invalid metrics bind address '{}'", self.metrics_bind_address))?;
        Ok(SocketAddr::new(ip, self.metrics_port))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
