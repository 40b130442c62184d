// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Leader election gate.
//!
//! Every replica keeps its watches and caches warm, but only the replica
//! holding the lease drains the work queue. Leadership arrives as a
//! `watch::Receiver<bool>` (from `kube-lease-manager`, or a constant `true`
//! when election is disabled) and drives a two-state machine:
//!
//! - **Standby → Leading**: enqueue every cached `CertificateRequest` and
//!   start the worker pool.
//! - **Leading → Standby**: stop dequeuing and wait for in-flight reconciles
//!   to finish. External calls already issued are not cancelled.
//!
//! A lease that cannot be renewed before it expires flips the channel to
//! `false`, so demotion is immediate.

use crate::context::Context;
use crate::controller::{run_worker, signalled};
use crate::errors::Error;
use crate::metrics;
use crate::queue::WorkQueue;
use crate::store::ReconcileKey;
use kube::Client;
use kube_lease_manager::{LeaseManager, LeaseManagerBuilder, LeaseManagerError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Whether this replica currently runs the reconcile loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LeadershipState {
    #[default]
    Standby,
    Leading,
}

/// Entry or exit action produced by a state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    StartedLeading,
    StoppedLeading,
}

impl LeadershipState {
    /// Next state for an observed lease status, with the action to run on the edge.
    #[must_use]
    pub fn transition(self, is_leader: bool) -> (LeadershipState, Option<Transition>) {
        match (self, is_leader) {
            (LeadershipState::Standby, true) => {
                (LeadershipState::Leading, Some(Transition::StartedLeading))
            }
            (LeadershipState::Leading, false) => {
                (LeadershipState::Standby, Some(Transition::StoppedLeading))
            }
            (state, _) => (state, None),
        }
    }
}

/// Lease parameters for [`start_lease`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaseConfig {
    pub lease_name: String,
    pub namespace: String,
    pub identity: String,
    /// Seconds a lease stays valid without renewal
    pub duration_secs: u64,
    /// Seconds before expiry at which renewal starts
    pub grace_secs: u64,
}

/// Start competing for the lease.
///
/// The returned receiver reports `true` while this replica holds the lease.
/// Dropping it stops the manager task, which releases the lease.
///
/// # Errors
///
/// Returns an error if the lease manager cannot be built.
pub async fn start_lease(
    client: Client,
    config: &LeaseConfig,
) -> Result<
    (
        watch::Receiver<bool>,
        JoinHandle<Result<LeaseManager, LeaseManagerError>>,
    ),
    Error,
> {
    info!(
        lease = %config.lease_name,
        namespace = %config.namespace,
        identity = %config.identity,
        duration_secs = config.duration_secs,
        grace_secs = config.grace_secs,
        "Starting leader election"
    );

    let manager = LeaseManagerBuilder::new(client, &config.lease_name)
        .with_namespace(&config.namespace)
        .with_identity(&config.identity)
        .with_duration(config.duration_secs)
        .with_grace(config.grace_secs)
        .build()
        .await?;

    Ok(manager.watch().await)
}

/// Leadership channel for a replica that always leads.
///
/// Keep the sender alive for as long as the gate runs.
#[must_use]
pub fn always_leader() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(true)
}

/// Runs the worker pool while, and only while, this replica leads.
pub struct LeaderGate {
    ctx: Context,
    queue: WorkQueue<ReconcileKey>,
    workers: usize,
    identity: String,
}

/// Worker pool started on `StartedLeading`.
struct Pool {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl LeaderGate {
    #[must_use]
    pub fn new(
        ctx: Context,
        queue: WorkQueue<ReconcileKey>,
        workers: usize,
        identity: String,
    ) -> Self {
        Self {
            ctx,
            queue,
            workers: workers.max(1),
            identity,
        }
    }

    /// Follow `leadership` until `shutdown` turns `true` or the leadership
    /// source goes away, starting and stopping the worker pool on each edge.
    ///
    /// Returns after in-flight reconciles have finished.
    pub async fn run(
        &self,
        mut leadership: watch::Receiver<bool>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut state = LeadershipState::Standby;
        let mut pool: Option<Pool> = None;

        loop {
            let is_leader = *leadership.borrow_and_update();
            let (next, transition) = state.transition(is_leader);
            state = next;
            match transition {
                Some(Transition::StartedLeading) => pool = Some(self.start_leading()),
                Some(Transition::StoppedLeading) => {
                    if let Some(pool) = pool.take() {
                        self.stop_leading(pool).await;
                    }
                }
                None => {}
            }

            tokio::select! {
                biased;
                () = signalled(&mut shutdown) => {
                    debug!("Shutdown requested, leaving leader gate");
                    break;
                }
                changed = leadership.changed() => {
                    if changed.is_err() {
                        warn!(identity = %self.identity, "Leadership source closed, stepping down");
                        break;
                    }
                }
            }
        }

        if let Some(pool) = pool.take() {
            self.stop_leading(pool).await;
        }
    }

    fn start_leading(&self) -> Pool {
        info!(identity = %self.identity, workers = self.workers, "Started leading");
        metrics::record_leader_elected(&self.identity);

        let cached = self.ctx.certificates.list();
        let count = cached.len();
        for obj in cached {
            self.queue.add(ReconcileKey::from_object(obj.as_ref()));
        }
        metrics::set_queue_depth(self.queue.len());
        debug!(count, "Enqueued cached CertificateRequests");

        let (stop, stop_rx) = watch::channel(false);
        let handles = (0..self.workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    self.ctx.clone(),
                    self.queue.clone(),
                    stop_rx.clone(),
                ))
            })
            .collect();
        Pool { stop, handles }
    }

    async fn stop_leading(&self, pool: Pool) {
        info!(identity = %self.identity, "Stopped leading, draining in-flight reconciles");
        metrics::record_leader_lost(&self.identity);

        // Receivers may already be gone if every worker exited.
        let _ = pool.stop.send(true);
        for handle in pool.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }
        debug!(identity = %self.identity, "Worker pool stopped");
    }
}

#[cfg(test)]
#[path = "leader_tests.rs"]
mod leader_tests;
