// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch feeds and the worker loop.
//!
//! # Data flow
//!
//! ```text
//! CertificateRequest watch ─┐
//!                           ├─► mpsc<ReconcileKey> ─► pump ─► WorkQueue ─► workers
//! Ingress watch ────────────┘
//! ```
//!
//! Each watch updates its reflector cache before emitting keys, so a worker
//! always reads a cache at least as new as the event that queued the key.
//! Workers only run while this replica leads (see [`crate::leader`]).

use crate::context::Context;
use crate::ingress::keys_for_ingress;
use crate::metrics;
use crate::queue::WorkQueue;
use crate::reconcilers::{reconcile_certificate_request, ReconcileAction};
use crate::store::ReconcileKey;
use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::store::{Writer, WriterDropped};
use kube::runtime::reflector::Store;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;
use std::pin::pin;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Keys an ingress event should enqueue.
#[must_use]
pub fn ingress_event_keys(ctx: &Context, ingress: &Ingress) -> Vec<ReconcileKey> {
    keys_for_ingress(ingress, |cert_name| ctx.owner_of_certificate(cert_name))
}

/// Run a watch on `api`, keep `writer`'s cache current and send the keys
/// `keys_of` derives from every added, modified or deleted object.
///
/// Returns when the channel is closed. Watch errors are retried with backoff.
pub async fn watch_feed<K, F>(
    api: Api<K>,
    writer: Writer<K>,
    tx: mpsc::Sender<ReconcileKey>,
    keys_of: F,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
    F: Fn(&K) -> Vec<ReconcileKey>,
{
    let kind = K::kind(&K::DynamicType::default()).to_string();
    info!(kind = %kind, "Starting watch");

    let mut events = pin!(watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .touched_objects());

    while let Some(event) = events.next().await {
        match event {
            Ok(obj) => {
                for key in keys_of(&obj) {
                    debug!(kind = %kind, key = %key, "Watch event");
                    if tx.send(key).await.is_err() {
                        debug!(kind = %kind, "Event channel closed, stopping watch");
                        return;
                    }
                }
            }
            Err(e) => warn!(kind = %kind, error = %e, "Watch error, retrying"),
        }
    }
}

/// Move keys from the watch channel into the work queue until every sender is gone.
pub async fn pump(mut rx: mpsc::Receiver<ReconcileKey>, queue: WorkQueue<ReconcileKey>) {
    while let Some(key) = rx.recv().await {
        queue.add(key);
        metrics::set_queue_depth(queue.len());
    }
    debug!("Event channel closed, pump finished");
}

/// Wait until both caches have completed their initial list.
///
/// # Errors
///
/// Returns an error if a watch task ended before its cache became ready.
pub async fn wait_for_cache_sync<A, B>(
    certificates: &Store<A>,
    ingresses: &Store<B>,
) -> Result<(), WriterDropped>
where
    A: Resource + Clone + 'static,
    A::DynamicType: Eq + Hash + Clone,
    B: Resource + Clone + 'static,
    B::DynamicType: Eq + Hash + Clone,
{
    info!("Waiting for caches to sync");
    certificates.wait_until_ready().await?;
    ingresses.wait_until_ready().await?;
    info!(
        certificate_requests = certificates.state().len(),
        ingresses = ingresses.state().len(),
        "Caches synced"
    );
    Ok(())
}

/// Reconcile one key and schedule its next visit.
///
/// The caller still owns the key and must call `queue.done` afterwards.
pub async fn process_key(ctx: &Context, queue: &WorkQueue<ReconcileKey>, key: &ReconcileKey) {
    let start = Instant::now();
    let result = reconcile_certificate_request(ctx, key).await;
    let duration = start.elapsed();

    match result {
        Ok(ReconcileAction::Done) => {
            queue.forget(key);
            metrics::record_reconciliation("success", duration);
            debug!(key = %key, duration_ms = duration.as_millis(), "Reconciled");
        }
        Ok(ReconcileAction::RequeueAfter(delay)) => {
            queue.forget(key);
            queue.add_after(key.clone(), delay);
            metrics::record_reconciliation("requeue", duration);
            metrics::record_requeue("poll");
            debug!(key = %key, delay_secs = delay.as_secs(), "Reconciled, polling provider again later");
        }
        Err(e) if e.is_retryable() => {
            let delay = queue.add_rate_limited(key.clone());
            metrics::record_reconciliation("retry", duration);
            metrics::record_requeue("backoff");
            metrics::record_error(e.category());
            warn!(
                key = %key,
                error = %e,
                attempt = queue.num_requeues(key),
                delay_ms = delay.as_millis(),
                "Reconcile failed, retrying with backoff"
            );
        }
        Err(e) => {
            queue.forget(key);
            metrics::record_reconciliation("failed", duration);
            metrics::record_error(e.category());
            error!(
                key = %key,
                error = %e,
                category = e.category(),
                "Reconcile failed permanently, waiting for the next change"
            );
        }
    }
}

/// Resolve once `rx` holds `true` or its sender is gone.
pub async fn signalled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|set| *set).await;
}

/// Worker loop: take a key, reconcile it, release it.
///
/// Stops taking keys as soon as `stop` turns `true` (or its sender is gone)
/// and returns once the current reconcile, if any, has finished.
pub async fn run_worker(
    id: usize,
    ctx: Context,
    queue: WorkQueue<ReconcileKey>,
    mut stop: watch::Receiver<bool>,
) {
    debug!(worker = id, "Worker started");
    loop {
        let key = tokio::select! {
            biased;
            () = signalled(&mut stop) => break,
            key = queue.get() => match key {
                Some(key) => key,
                None => break,
            },
        };

        process_key(&ctx, &queue, &key).await;
        queue.done(&key);
        metrics::set_queue_depth(queue.len());
    }
    debug!(worker = id, "Worker stopped");
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
