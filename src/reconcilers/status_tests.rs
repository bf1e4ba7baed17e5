// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{CertificateRequestStatus, Condition};
    use crate::reconcilers::status::{
        create_condition, failed_status, find_condition, issued_status,
        update_condition_in_memory,
    };
    use crate::status_reasons::{
        CONDITION_TYPE_DENIED, CONDITION_TYPE_READY, REASON_FAILED, REASON_ISSUED, STATUS_FALSE,
        STATUS_TRUE,
    };

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition(CONDITION_TYPE_READY, STATUS_TRUE, REASON_ISSUED, "ok");

        assert_eq!(condition.r#type, CONDITION_TYPE_READY);
        assert_eq!(condition.status, STATUS_TRUE);
        assert_eq!(condition.reason.as_deref(), Some(REASON_ISSUED));
        assert_eq!(condition.message.as_deref(), Some("ok"));

        let timestamp = condition.last_transition_time.unwrap();
        assert!(timestamp.contains('T'));
    }

    #[test]
    fn test_update_preserves_transition_time_when_status_unchanged() {
        let mut conditions = vec![Condition {
            r#type: CONDITION_TYPE_READY.to_string(),
            status: STATUS_FALSE.to_string(),
            reason: Some("Pending".to_string()),
            message: Some("waiting".to_string()),
            last_transition_time: Some("2024-01-01T00:00:00+00:00".to_string()),
        }];

        update_condition_in_memory(
            &mut conditions,
            CONDITION_TYPE_READY,
            STATUS_FALSE,
            REASON_FAILED,
            "bad request",
        );

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason.as_deref(), Some(REASON_FAILED));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_update_bumps_transition_time_on_status_change() {
        let mut conditions = vec![Condition {
            r#type: CONDITION_TYPE_READY.to_string(),
            status: STATUS_FALSE.to_string(),
            last_transition_time: Some("2024-01-01T00:00:00+00:00".to_string()),
            ..Default::default()
        }];

        update_condition_in_memory(&mut conditions, CONDITION_TYPE_READY, STATUS_TRUE, REASON_ISSUED, "ok");

        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_issued_status_keeps_other_conditions() {
        let current = CertificateRequestStatus {
            conditions: vec![create_condition("Approved", STATUS_TRUE, "policy", "approved")],
            failure_time: Some("2024-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };

        let status = issued_status(Some(&current), "CERT".to_string(), "CA".to_string());

        assert_eq!(status.certificate.as_deref(), Some("CERT"));
        assert_eq!(status.ca.as_deref(), Some("CA"));
        assert!(status.failure_time.is_none());
        assert!(find_condition(&status.conditions, "Approved").is_some());
        let ready = find_condition(&status.conditions, CONDITION_TYPE_READY).unwrap();
        assert_eq!(ready.status, STATUS_TRUE);
        assert_eq!(ready.reason.as_deref(), Some(REASON_ISSUED));
    }

    #[test]
    fn test_failed_status() {
        let status = failed_status(None, "CSR is not valid PEM");

        assert!(status.certificate.is_none());
        assert!(status.failure_time.is_some());
        let ready = find_condition(&status.conditions, CONDITION_TYPE_READY).unwrap();
        assert_eq!(ready.status, STATUS_FALSE);
        assert_eq!(ready.reason.as_deref(), Some(REASON_FAILED));
        assert_eq!(ready.message.as_deref(), Some("CSR is not valid PEM"));
        assert!(find_condition(&status.conditions, CONDITION_TYPE_DENIED).is_none());
    }
}
