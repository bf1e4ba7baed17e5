// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-call deadline and shutdown propagation.
//!
//! Every cloud, cluster or keystore call made by a reconciler goes through
//! [`CallScope::run`]. A call that outlives the configured deadline becomes a
//! `TransientCloud` error (requeued); a call interrupted by shutdown becomes
//! `Cancelled` (never requeued).

use crate::errors::ControllerError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation token plus per-call timeout, handed to every reconcile.
#[derive(Debug, Clone)]
pub struct CallScope {
    token: CancellationToken,
    call_timeout: Duration,
}

impl CallScope {
    #[must_use]
    pub fn new(token: CancellationToken, call_timeout: Duration) -> Self {
        Self {
            token,
            call_timeout,
        }
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Run `fut` under the scope's deadline and cancellation token.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::Cancelled`] when shutdown is requested first
    /// - [`ControllerError::TransientCloud`] when the deadline expires first
    /// - whatever `fut` itself returns otherwise
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T, ControllerError>
    where
        F: Future<Output = Result<T, ControllerError>>,
    {
        if self.token.is_cancelled() {
            return Err(ControllerError::Cancelled(operation.to_string()));
        }

        tokio::select! {
            () = self.token.cancelled() => {
                debug!(operation, "call abandoned on shutdown");
                Err(ControllerError::Cancelled(operation.to_string()))
            }
            result = tokio::time::timeout(self.call_timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(ControllerError::transient(
                    operation,
                    format!("deadline of {}s exceeded", self.call_timeout.as_secs_f64()),
                )),
            },
        }
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod scope_tests;
