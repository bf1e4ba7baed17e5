// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition types and reasons written to `CertificateRequest` status.
//!
//! Reasons are programmatic identifiers in CamelCase. The `Ready` condition is
//! the only user-visible signal this controller writes; every other reconciler
//! reports through logs and metrics.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   certificate: LS0tLS1CRUdJTi...
//!   ca: LS0tLS1CRUdJTi...
//!   conditions:
//!     - type: Ready
//!       status: "True"
//!       reason: Issued
//!       message: "Certificate issued by keyset kubernetes-ca"
//! ```

/// The `Ready` condition type
pub const CONDITION_TYPE_READY: &str = "Ready";

/// cert-manager's denial condition type
pub const CONDITION_TYPE_DENIED: &str = "Denied";

/// Condition status `True`
pub const STATUS_TRUE: &str = "True";

/// Condition status `False`
pub const STATUS_FALSE: &str = "False";

/// The certificate was signed and written to status.
pub const REASON_ISSUED: &str = "Issued";

/// Signing failed permanently (malformed CSR, policy violation, missing signer).
///
/// A request with this reason is never retried; create a new request instead.
pub const REASON_FAILED: &str = "Failed";
