// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for kops-controller.
//!
//! Every metric carries the `kops_controller_` prefix.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Outcome and duration of every reconcile
//! - **Error Metrics** - Failures by error kind
//! - **Write Metrics** - Node patches, hosts table applies and issued certificates
//!
//! # Example
//!
//! ```rust,no_run
//! use kops_controller::metrics::record_reconciliation;
//!
//! record_reconciliation("node-labels", "noop", std::time::Duration::from_millis(12));
//! ```

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::constants::METRICS_SERVER_PATH;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "kops_controller";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry, exposed on `/metrics`.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by controller and status
///
/// Labels:
/// - `controller`: `node-labels`, `pod-cidr`, `hosts` or `certificate-request`
/// - `status`: Outcome (`patched`, `noop`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by controller and status",
    );
    let counter = CounterVec::new(opts, &["controller", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by controller",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["controller"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue operations
///
/// Labels:
/// - `controller`: Controller name
/// - `reason`: Error kind that caused the requeue
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by controller and reason",
    );
    let counter = CounterVec::new(opts, &["controller", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by controller and error kind
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by controller and error kind",
    );
    let counter = CounterVec::new(opts, &["controller", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Write Metrics
// ============================================================================

/// Server-side applies of the hosts `ConfigMap`
pub static HOSTS_PATCHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_hosts_patches_total"),
        "Total number of hosts ConfigMap applies",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Node patches by field (`labels`, `podCIDR`)
pub static NODE_PATCHES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_node_patches_total"),
        "Total number of Node patches by field",
    );
    let counter = CounterVec::new(opts, &["field"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Certificates signed, by signer keyset
pub static CERTIFICATES_ISSUED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_certificates_issued_total"),
        "Total number of certificates issued by signer",
    );
    let counter = CounterVec::new(opts, &["signer"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation with its outcome (`patched` or `noop`).
pub fn record_reconciliation(controller: &str, outcome: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[controller, outcome])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[controller])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(controller: &str, error_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[controller, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[controller])
        .observe(duration.as_secs_f64());
    ERRORS_TOTAL
        .with_label_values(&[controller, error_type])
        .inc();
}

/// Record a requeue decided by the error policy
pub fn record_requeue(controller: &str, reason: &str) {
    REQUEUE_TOTAL.with_label_values(&[controller, reason]).inc();
}

pub fn record_hosts_patch() {
    HOSTS_PATCHES_TOTAL.inc();
}

pub fn record_node_patch(field: &str) {
    NODE_PATCHES_TOTAL.with_label_values(&[field]).inc();
}

pub fn record_certificate_issued(signer: &str) {
    CERTIFICATES_ISSUED_TOTAL.with_label_values(&[signer]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

// ============================================================================
// HTTP server
// ============================================================================

/// Readiness flag shared between `main` and the `/readyz` handler.
#[derive(Debug, Default)]
pub struct Readiness {
    ready: AtomicBool,
}

impl Readiness {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(State(readiness): State<Arc<Readiness>>) -> impl IntoResponse {
    if readiness.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                "# Error encoding metrics".to_string(),
            )
        }
    }
}

/// Router serving `/metrics`, `/healthz` and `/readyz`.
pub fn create_router(readiness: Arc<Readiness>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .with_state(readiness)
}

/// Serve metrics and health endpoints until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn run_metrics_server(
    addr: SocketAddr,
    readiness: Arc<Readiness>,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = create_router(readiness);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Starting metrics server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
