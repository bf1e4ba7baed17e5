// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `http_errors.rs`

#[cfg(test)]
mod tests {
    use crate::errors::ErrorKind;
    use crate::http_errors::{classify_status, is_retryable_http_status};
    use reqwest::StatusCode;

    #[test]
    fn test_retryable_statuses() {
        for code in [429, 500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(is_retryable_http_status(status), "HTTP {code} should be retryable");
            assert_eq!(
                classify_status(status, "op", "").kind(),
                ErrorKind::TransientCloud
            );
        }
    }

    #[test]
    fn test_not_found() {
        let err = classify_status(StatusCode::NOT_FOUND, "compute.instances.get", "no such instance");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("HTTP 404"));
        assert!(err.to_string().contains("no such instance"));
    }

    #[test]
    fn test_auth_failures_are_terminal() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, "op", "").kind(),
            ErrorKind::Terminal
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, "op", "").kind(),
            ErrorKind::Terminal
        );
    }

    #[test]
    fn test_unexpected_status_is_ambiguous() {
        let err = classify_status(StatusCode::IM_A_TEAPOT, "op", "");
        assert_eq!(err.kind(), ErrorKind::Ambiguous);
        assert!(!is_retryable_http_status(StatusCode::BAD_REQUEST));
    }
}
