// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `metrics.rs`

#[cfg(test)]
mod tests {
    use crate::metrics::{
        create_router, gather_metrics, record_certificate_issued, record_reconciliation,
        record_reconciliation_error, record_requeue, Readiness, CERTIFICATES_ISSUED_TOTAL,
        ERRORS_TOTAL, RECONCILIATION_DURATION_SECONDS, RECONCILIATION_TOTAL, REQUEUE_TOTAL,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    #[test]
    fn test_record_reconciliation() {
        record_reconciliation("test-patched", "patched", Duration::from_millis(500));

        let counter = RECONCILIATION_TOTAL.with_label_values(&["test-patched", "patched"]);
        assert!(counter.get() > 0.0);

        let histogram = RECONCILIATION_DURATION_SECONDS.with_label_values(&["test-patched"]);
        assert!(histogram.get_sample_count() > 0);
    }

    #[test]
    fn test_record_reconciliation_error() {
        record_reconciliation_error("test-error", "transient_cloud", Duration::from_millis(250));

        let counter = RECONCILIATION_TOTAL.with_label_values(&["test-error", "error"]);
        assert!(counter.get() > 0.0);
        let errors = ERRORS_TOTAL.with_label_values(&["test-error", "transient_cloud"]);
        assert!(errors.get() > 0.0);
    }

    #[test]
    fn test_record_requeue_and_issue() {
        record_requeue("test-requeue", "conflict");
        record_certificate_issued("test-signer");

        assert!(REQUEUE_TOTAL.with_label_values(&["test-requeue", "conflict"]).get() > 0.0);
        assert!(CERTIFICATES_ISSUED_TOTAL.with_label_values(&["test-signer"]).get() > 0.0);
    }

    #[test]
    fn test_gather_metrics() {
        record_reconciliation("gather-test", "noop", Duration::from_millis(100));

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("kops_controller_reconciliations_total"));
    }

    #[tokio::test]
    async fn test_readyz_reflects_readiness() {
        let readiness = Arc::new(Readiness::new());
        let app = create_router(readiness.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        readiness.set_ready(true);
        let response = app
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        record_reconciliation("endpoint-test", "noop", Duration::from_millis(1));
        let app = create_router(Arc::new(Readiness::new()));

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = create_router(Arc::new(Readiness::new()))
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
