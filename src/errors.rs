// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for reconcilers, cloud providers and the keystore.
//!
//! Every failure a reconciler can return is a [`ControllerError`], and every
//! `ControllerError` belongs to exactly one [`ErrorKind`]. The kind decides what
//! the reconciliation fabric does next:
//!
//! | Kind | Fabric behaviour |
//! |------|------------------|
//! | `NotReady` | no work, wait for the next event |
//! | `TransientCloud` | requeue with exponential back-off |
//! | `Conflict` | requeue immediately |
//! | `Ambiguous` | requeue with back-off, logged at warning |
//! | `NotFound` | requeue with back-off |
//! | `Terminal` | record on status where possible, never requeue |
//! | `Fatal` | stop the process |
//! | `Cancelled` | shutdown in progress, never requeue |

use thiserror::Error;

/// Classification of a [`ControllerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotReady,
    TransientCloud,
    Conflict,
    Ambiguous,
    NotFound,
    Terminal,
    Fatal,
    Cancelled,
}

impl ErrorKind {
    /// Short snake-case name used as a metric label value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotReady => "not_ready",
            ErrorKind::TransientCloud => "transient",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Terminal => "terminal",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

/// Errors returned by reconcilers and the components they call.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// A precondition is absent (e.g. empty `providerID`); a later event will retry.
    #[error("not ready: {0}")]
    NotReady(String),

    /// A cloud or cluster call failed in a way that may succeed later
    /// (HTTP 429/5xx, connection errors, per-call deadline exceeded).
    #[error("transient failure during {operation}: {message}")]
    TransientCloud {
        /// The operation that failed (e.g. "DescribeNetworkInterfaces")
        operation: String,
        /// Underlying error text
        message: String,
    },

    /// The cluster rejected a write because of a resource-version conflict.
    #[error("conflict updating {resource}: {message}")]
    Conflict {
        /// The resource that was being written
        resource: String,
        /// Message returned by the API server
        message: String,
    },

    /// The cloud returned a shape the controller cannot act on
    /// (e.g. several network interfaces, several IPv6 prefixes).
    #[error("ambiguous cloud response: {0}")]
    Ambiguous(String),

    /// A resource the reconcile depends on does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Retrying cannot help (malformed input, policy violation).
    #[error("{0}")]
    Terminal(String),

    /// The process cannot continue.
    #[error("fatal: {0}")]
    Fatal(String),

    /// The operation was abandoned because the controller is shutting down.
    #[error("{0} cancelled by shutdown")]
    Cancelled(String),

    /// Keystore failure.
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
}

impl ControllerError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::NotReady(_) => ErrorKind::NotReady,
            ControllerError::TransientCloud { .. } => ErrorKind::TransientCloud,
            ControllerError::Conflict { .. } => ErrorKind::Conflict,
            ControllerError::Ambiguous(_) => ErrorKind::Ambiguous,
            ControllerError::NotFound(_) => ErrorKind::NotFound,
            ControllerError::Terminal(_) => ErrorKind::Terminal,
            ControllerError::Fatal(_) => ErrorKind::Fatal,
            ControllerError::Cancelled(_) => ErrorKind::Cancelled,
            ControllerError::Keystore(e) if e.is_retryable() => ErrorKind::TransientCloud,
            ControllerError::Keystore(_) => ErrorKind::Terminal,
        }
    }

    /// Whether the fabric should requeue the key after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientCloud
                | ErrorKind::Conflict
                | ErrorKind::Ambiguous
                | ErrorKind::NotFound
        )
    }

    /// Delay before the fabric retries this key, `None` when it must not be requeued.
    #[must_use]
    pub fn requeue_after(&self, attempt: u32) -> Option<std::time::Duration> {
        crate::reconcilers::retry::requeue_after(self.kind(), attempt)
    }

    /// Shorthand for a transient failure of `operation`.
    pub fn transient(operation: impl Into<String>, message: impl ToString) -> Self {
        ControllerError::TransientCloud {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Convert a Kubernetes client error, classifying it by HTTP status.
    ///
    /// - 409 becomes [`ControllerError::Conflict`]
    /// - 404 becomes [`ControllerError::NotFound`]
    /// - 429, 5xx and transport failures become [`ControllerError::TransientCloud`]
    /// - everything else is [`ControllerError::Terminal`]
    #[must_use]
    pub fn from_kube(resource: &str, err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(ae) if ae.code == 409 => ControllerError::Conflict {
                resource: resource.to_string(),
                message: ae.message.clone(),
            },
            kube::Error::Api(ae) if ae.code == 404 => {
                ControllerError::NotFound(format!("{resource}: {}", ae.message))
            }
            kube::Error::Api(ae) if ae.code == 429 || (500..600).contains(&ae.code) => {
                ControllerError::transient(resource, &err)
            }
            kube::Error::Service(_) => ControllerError::transient(resource, &err),
            _ => ControllerError::Terminal(format!("{resource}: {err}")),
        }
    }
}

/// Errors raised by the keystore while loading key material or issuing certificates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeystoreError {
    /// No keyset with the requested identifier exists.
    #[error("no keyset named '{0}' in the keystore")]
    MissingSigner(String),

    /// The request asked for something the issuer policy forbids (e.g. a CA).
    #[error("certificate policy violation: {0}")]
    PolicyViolation(String),

    /// The backing store could not be read.
    #[error("keystore storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Key material exists but cannot be used.
    #[error("invalid key material for keyset '{id}': {reason}")]
    InvalidKeyMaterial {
        /// Keyset identifier
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Signing itself failed.
    #[error("failed to sign certificate: {0}")]
    Signing(String),
}

impl KeystoreError {
    /// Only storage failures are worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, KeystoreError::StorageUnavailable(_))
    }
}

/// Reasons a node bootstrap certificate is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// The certificate name is known but not enabled on this controller.
    #[error("certificate '{0}' is not enabled")]
    NotEnabled(String),

    /// The certificate name is not one the controller knows how to issue.
    #[error("unexpected certificate name '{0}'")]
    UnknownName(String),

    /// The node built its request against a different CA keypair.
    #[error("request's keypair ID '{requested}' for {signer} does not match the keystore's '{current}'")]
    KeypairMismatch {
        /// Keyset the certificate is signed with
        signer: String,
        /// Keypair ID the node expects
        requested: String,
        /// Keypair ID currently primary in the keystore
        current: String,
    },

    /// Issuance failed in the keystore.
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
