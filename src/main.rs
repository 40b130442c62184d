// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::Parser;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector;
use kube::{Api, Client};
use managed_certs::{
    config::Config,
    constants::{EVENT_CHANNEL_CAPACITY, FIELD_MANAGER, TOKIO_WORKER_THREADS},
    context::{Context, KnownKeys},
    controller::{ingress_event_keys, pump, signalled, wait_for_cache_sync, watch_feed},
    crd::CertificateRequest,
    events::KubeEventPublisher,
    ingress::KubeIngressClient,
    leader::{always_leader, start_lease, LeaderGate},
    provider::http::HttpCertificateProvider,
    queue::WorkQueue,
    server::{self, Readiness},
    store::{KubeCertificateRequestStore, ReconcileKey},
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = Config::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("managed-certs-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_tracing() {
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json or text).
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

/// Wait for SIGTERM (pod termination) or SIGINT (ctrl-c).
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT, initiating graceful shutdown");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM (pod termination), initiating graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received ctrl-c, initiating graceful shutdown");
    }
    Ok(())
}

async fn async_main(config: Config) -> Result<()> {
    init_tracing();
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        workers = config.workers,
        leader_election = !config.disable_leader_election,
        "Starting managed certificate controller"
    );

    // Unrecoverable at startup: no API server, no controller.
    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let provider = HttpCertificateProvider::new(
        &config.provider_endpoint,
        &config.project,
        config.provider_token.clone(),
        config.provider_timeout(),
    )?;

    let identity = config.identity();
    let (certificate_cache, certificate_writer) = reflector::store::<CertificateRequest>();
    let (ingress_cache, ingress_writer) = reflector::store::<Ingress>();

    let ctx = Context {
        certificates: Arc::new(KubeCertificateRequestStore::new(
            client.clone(),
            certificate_cache.clone(),
        )),
        ingresses: Arc::new(KubeIngressClient::new(client.clone(), ingress_cache.clone())),
        provider: Arc::new(provider),
        events: Arc::new(KubeEventPublisher::new(
            client.clone(),
            FIELD_MANAGER,
            Some(identity.clone()),
        )),
        config: config.reconciler_config(),
        known: KnownKeys::default(),
    };

    let queue: WorkQueue<ReconcileKey> = WorkQueue::new(config.backoff());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Metrics and probes
    let readiness = Readiness::default();
    let mut server_shutdown = shutdown_rx.clone();
    let server_task = tokio::spawn(server::serve(
        config.metrics_addr()?,
        readiness.clone(),
        async move { signalled(&mut server_shutdown).await },
    ));

    // Watch feeds
    let (certificate_api, ingress_api): (Api<CertificateRequest>, Api<Ingress>) =
        match &config.namespace {
            Some(namespace) => (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client.clone(), namespace),
            ),
            None => (Api::all(client.clone()), Api::all(client.clone())),
        };

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let certificate_feed = tokio::spawn(watch_feed(
        certificate_api,
        certificate_writer,
        tx.clone(),
        |obj: &CertificateRequest| vec![ReconcileKey::from_object(obj)],
    ));
    let feed_ctx = ctx.clone();
    let ingress_feed = tokio::spawn(watch_feed(
        ingress_api,
        ingress_writer,
        tx,
        move |ingress: &Ingress| ingress_event_keys(&feed_ctx, ingress),
    ));
    let pump_task = tokio::spawn(pump(rx, queue.clone()));

    // Workers never see a partial cache.
    tokio::select! {
        result = wait_for_cache_sync(&certificate_cache, &ingress_cache) => {
            result.context("watch stopped before caches synced")?;
        }
        result = shutdown_signal() => {
            result?;
            info!("Shutdown requested before caches synced");
            return Ok(());
        }
    }
    readiness.set_ready(true);

    // Leadership
    let (_always_leader, leadership, lease_task) = if config.disable_leader_election {
        warn!("Leader election disabled, this replica always reconciles");
        let (tx, rx) = always_leader();
        (Some(tx), rx, None)
    } else {
        let (rx, task) = start_lease(client.clone(), &config.lease_config()).await?;
        (None, rx, Some(task))
    };

    let gate = LeaderGate::new(ctx, queue.clone(), config.workers, identity);
    let gate_shutdown = shutdown_rx.clone();
    let mut gate_task = tokio::spawn(async move { gate.run(leadership, gate_shutdown).await });

    info!("Controller running");
    let mut exit = Ok(());
    tokio::select! {
        result = shutdown_signal() => {
            if let Err(e) = result {
                error!(error = %e, "Signal handler failed, shutting down");
            }
        }
        result = &mut gate_task => {
            error!(result = ?result, "CRITICAL: leader gate exited unexpectedly");
            exit = Err(anyhow::anyhow!("leader gate exited unexpectedly"));
        }
    }

    // In-flight reconciles finish; nothing new is dequeued.
    let _ = shutdown_tx.send(true);
    if !gate_task.is_finished() {
        if let Err(e) = gate_task.await {
            warn!(error = %e, "Leader gate task failed");
        }
    }
    queue.shutdown();

    certificate_feed.abort();
    ingress_feed.abort();
    if let Err(e) = pump_task.await {
        warn!(error = %e, "Pump task failed");
    }

    if let Some(task) = lease_task {
        // The gate dropped the leadership receiver, so the manager releases the lease.
        match task.await {
            Ok(Ok(_)) => info!("Lease released"),
            Ok(Err(e)) => warn!(error = %e, "Failed to release lease"),
            Err(e) => warn!(error = %e, "Lease task failed"),
        }
    }

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Metrics server failed"),
        Err(e) => warn!(error = %e, "Metrics server task failed"),
    }

    info!("Shutdown complete");
    exit
}
