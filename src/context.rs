// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! Every controller receives an `Arc<Context>` holding:
//! - the cluster surface ([`ClusterApi`])
//! - the cloud provider selected at startup
//! - the keystore, when CSR signing is enabled
//! - the frozen startup options
//! - the root cancellation token
//! - per-controller state (hosts cache, requeue attempts)
//!
//! Nothing here is mutated after construction except the interior state of
//! [`HostsState`] and [`RequeueTracker`], which guard themselves.

use crate::cloud::CloudProvider;
use crate::cluster::ClusterApi;
use crate::config::Options;
use crate::keystore::Keystore;
use crate::reconcilers::retry::RequeueTracker;
use crate::reconcilers::scope::CallScope;
use crate::reconcilers::HostsState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Reads and writes against the cluster
    pub cluster: Arc<dyn ClusterApi>,

    /// Identity and IPAM provider for the configured cloud
    pub cloud: Arc<CloudProvider>,

    /// CA keystore, `None` unless the CSR controller is enabled
    pub keystore: Option<Arc<dyn Keystore>>,

    pub options: Arc<Options>,

    /// Cancelled on SIGTERM/SIGINT
    pub token: CancellationToken,

    /// Hosts reconciler cache and tracked control-plane nodes
    pub hosts: Arc<HostsState>,

    /// Attempt counters keyed by `controller/namespace/name`
    pub requeues: Arc<RequeueTracker>,
}

impl Context {
    #[must_use]
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        cloud: Arc<CloudProvider>,
        keystore: Option<Arc<dyn Keystore>>,
        options: Arc<Options>,
        token: CancellationToken,
    ) -> Self {
        Self {
            cluster,
            cloud,
            keystore,
            options,
            token,
            hosts: Arc::new(HostsState::new()),
            requeues: Arc::new(RequeueTracker::new()),
        }
    }

    /// A fresh call scope bound to the root token and the configured per-call timeout.
    #[must_use]
    pub fn scope(&self) -> CallScope {
        CallScope::new(self.token.clone(), self.options.cloud_call_timeout)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
