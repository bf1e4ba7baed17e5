// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for `CertificateRequest`.
//!
//! # Condition Format
//!
//! Conditions follow the standard Kubernetes shape:
//! - `type`: the aspect being reported (`Ready`, `Denied`)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: a programmatic identifier (CamelCase)
//! - `message`: a human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed
//!
//! Only in-memory manipulation lives here. The reconciler persists the result
//! through [`crate::cluster::ClusterApi::patch_certificate_request_status`].

use crate::crd::{CertificateRequestStatus, Condition};
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_FAILED, REASON_ISSUED, STATUS_FALSE, STATUS_TRUE,
};
use chrono::Utc;

/// Create a new condition stamped with the current time.
///
/// # Example
///
/// ```rust
/// # use kops_controller::reconcilers::status::create_condition;
/// let condition = create_condition("Ready", "True", "Issued", "Certificate issued");
/// assert_eq!(condition.r#type, "Ready");
/// assert_eq!(condition.status, "True");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in place (no API call).
///
/// `lastTransitionTime` is preserved when the status does not change.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Status for a successfully signed request.
///
/// Conditions already present on `current` (other than `Ready`) are kept.
#[must_use]
pub fn issued_status(
    current: Option<&CertificateRequestStatus>,
    certificate: String,
    ca: String,
) -> CertificateRequestStatus {
    let mut status = current.cloned().unwrap_or_default();
    status.certificate = Some(certificate);
    status.ca = Some(ca);
    status.failure_time = None;
    update_condition_in_memory(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        STATUS_TRUE,
        REASON_ISSUED,
        "Certificate fetched from issuer successfully",
    );
    status
}

/// Status for a request that failed permanently.
#[must_use]
pub fn failed_status(
    current: Option<&CertificateRequestStatus>,
    message: &str,
) -> CertificateRequestStatus {
    let mut status = current.cloned().unwrap_or_default();
    status.failure_time = Some(Utc::now().to_rfc3339());
    update_condition_in_memory(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        STATUS_FALSE,
        REASON_FAILED,
        message,
    );
    status
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
