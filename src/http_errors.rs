// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP status code mapping for cloud REST APIs.
//!
//! The GCE and Scaleway providers talk to their clouds over plain HTTPS. This
//! module turns a non-success status into the [`ControllerError`] kind the
//! reconciliation fabric understands.
//!
//! # HTTP Code Mapping
//!
//! | HTTP Code | Error kind | Meaning |
//! |-----------|------------|---------|
//! | 401, 403 | `Terminal` | Credentials missing or insufficient |
//! | 404 | `NotFound` | Instance or IP does not exist (yet) |
//! | 429 | `TransientCloud` | Rate limited |
//! | 500, 502, 503, 504 | `TransientCloud` | Cloud-side failure |
//! | Other | `Ambiguous` | Unexpected response |

use crate::errors::ControllerError;
use reqwest::StatusCode;

/// Determine if an HTTP status code is retryable.
///
/// # Retryable Status Codes
///
/// - **429** (Too Many Requests) - Rate limiting
/// - **500** (Internal Server Error) - Server error
/// - **502** (Bad Gateway) - Proxy/gateway error
/// - **503** (Service Unavailable) - Temporary unavailability
/// - **504** (Gateway Timeout) - Gateway timeout
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Map a non-success HTTP status from a cloud API to a [`ControllerError`].
///
/// # Arguments
///
/// * `status` - The HTTP status returned by the cloud
/// * `operation` - Human-readable name of the call (e.g. "compute.instances.get")
/// * `body` - Response body, included in the message for troubleshooting
#[must_use]
pub fn classify_status(status: StatusCode, operation: &str, body: &str) -> ControllerError {
    let message = format!("{operation} returned HTTP {}: {}", status.as_u16(), body.trim());

    if is_retryable_http_status(status) {
        return ControllerError::transient(operation, message);
    }

    match status {
        StatusCode::NOT_FOUND => ControllerError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ControllerError::Terminal(message),
        _ => ControllerError::Ambiguous(message),
    }
}

/// Map a transport-level `reqwest` failure (no HTTP status) to a transient error.
#[must_use]
pub fn classify_transport(operation: &str, err: &reqwest::Error) -> ControllerError {
    match err.status() {
        Some(status) => classify_status(status, operation, &err.to_string()),
        None => ControllerError::transient(operation, err),
    }
}

#[cfg(test)]
#[path = "http_errors_tests.rs"]
mod http_errors_tests;
