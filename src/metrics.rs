// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the managed certificate controller.
//!
//! All metrics carry the `managed_certs_` prefix.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - reconcile outcomes, durations and requeues
//! - **External Certificate Metrics** - certificates created, updated and deleted
//! - **Ingress Metrics** - attach and detach writes
//! - **Queue Metrics** - keys waiting in the work queue
//! - **Leader Election Metrics** - leadership transitions
//!
//! # Example
//!
//! ```rust,no_run
//! use managed_certs::metrics::record_reconciliation;
//!
//! record_reconciliation("success", std::time::Duration::from_millis(120));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "managed_certs";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total reconciliations by outcome (`success`, `requeue`, `retry`, `failed`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of a single reconcile
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Requeues by reason (`poll`, `backoff`)
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Reconcile errors by category (see `Error::category`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of reconcile errors by category",
    );
    let counter = CounterVec::new(opts, &["error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// External Certificate Metrics
// ============================================================================

/// Mutating calls against the provider by operation (`create`, `update`, `delete`)
pub static EXTERNAL_CERTIFICATE_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_external_certificate_operations_total"),
        "Total number of external certificate mutations by operation",
    );
    let counter = CounterVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Ingress Metrics
// ============================================================================

/// Ingress annotation writes by operation (`attach`, `detach`)
pub static INGRESS_UPDATES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_ingress_updates_total"),
        "Total number of ingress annotation updates by operation",
    );
    let counter = CounterVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Queue Metrics
// ============================================================================

/// Keys ready in the work queue
pub static QUEUE_DEPTH: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        format!("{METRICS_NAMESPACE}_queue_depth"),
        "Number of keys waiting in the work queue",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Leader Election Metrics
// ============================================================================

/// Leadership transitions by status (`acquired`, `lost`)
pub static LEADER_ELECTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_elections_total"),
        "Total number of leader election events by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// 1 while this pod leads, 0 otherwise
pub static LEADER_STATUS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_status"),
        "Current leader election status (1 = leader, 0 = follower)",
    );
    let gauge = GaugeVec::new(opts, &["pod_name"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a finished reconcile.
pub fn record_reconciliation(outcome: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[outcome]).inc();
    RECONCILIATION_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_requeue(reason: &str) {
    REQUEUE_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

pub fn record_external_certificate_operation(operation: &str) {
    EXTERNAL_CERTIFICATE_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn record_ingress_update(operation: &str) {
    INGRESS_UPDATES_TOTAL.with_label_values(&[operation]).inc();
}

pub fn set_queue_depth(depth: usize) {
    QUEUE_DEPTH.set(i64::try_from(depth).unwrap_or(i64::MAX));
}

pub fn record_leader_elected(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL
        .with_label_values(&["acquired"])
        .inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(1.0);
}

pub fn record_leader_lost(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL.with_label_values(&["lost"]).inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(0.0);
}

/// Encode every registered metric in the Prometheus text format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_reconciliation() {
        record_reconciliation("success", Duration::from_millis(500));

        let counter = RECONCILIATION_TOTAL.with_label_values(&["success"]);
        assert!(counter.get() > 0.0);
        assert!(RECONCILIATION_DURATION_SECONDS.get_sample_count() > 0);
    }

    #[test]
    fn test_record_external_certificate_operation() {
        let before = EXTERNAL_CERTIFICATE_OPERATIONS_TOTAL
            .with_label_values(&["create"])
            .get();
        record_external_certificate_operation("create");
        let after = EXTERNAL_CERTIFICATE_OPERATIONS_TOTAL
            .with_label_values(&["create"])
            .get();
        assert!(after > before);
    }

    #[test]
    fn test_leader_status_gauge() {
        record_leader_elected("test-pod");
        assert!((LEADER_STATUS.with_label_values(&["test-pod"]).get() - 1.0).abs() < f64::EPSILON);
        record_leader_lost("test-pod");
        assert!(LEADER_STATUS.with_label_values(&["test-pod"]).get().abs() < f64::EPSILON);
    }

    #[test]
    fn test_gather_metrics() {
        record_reconciliation("success", Duration::from_millis(100));
        set_queue_depth(3);

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("managed_certs_reconciliations_total"));
        assert!(metrics_text.contains("managed_certs_queue_depth"));
    }
}
