// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for nodes, the hosts table and certificate requests.
//!
//! Every reconciler is level-triggered: it reads the current state, computes
//! the desired state and writes only the difference. Reconcilers never loop
//! or sleep; a failure is returned to the controller, whose error policy
//! decides when to run the key again (see [`retry`]).
//!
//! # Available Reconcilers
//!
//! - [`reconcile_node_labels`] - Adds instance-group and role labels to a `Node`
//! - [`reconcile_pod_cidr`] - Assigns a `Node`'s pod CIDR from its cloud IPv6 prefix
//! - [`reconcile_hosts`] - Publishes control-plane addresses into the CoreDNS `ConfigMap`
//! - [`reconcile_certificate_request`] - Signs cert-manager `CertificateRequest`s
//!
//! # Outcome
//!
//! A reconcile returns [`Outcome::Patched`] when it wrote to the cluster and
//! [`Outcome::NoOp`] when the cluster already matched. Errors carry an
//! [`crate::errors::ErrorKind`] that drives the requeue decision.

pub mod csr;
pub mod hosts;
pub mod nodelabels;
pub mod podcidr;
pub mod predicates;
pub mod retry;
pub mod scope;
pub mod status;

pub use csr::reconcile_certificate_request;
pub use hosts::{reconcile_hosts, HostsState};
pub use nodelabels::reconcile_node_labels;
pub use podcidr::reconcile_pod_cidr;

use crate::errors::ControllerError;
use k8s_openapi::api::core::v1::Node;

/// Result of a successful reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The reconciler wrote to the cluster.
    Patched,
    /// Nothing to do.
    NoOp,
}

impl Outcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Patched => "patched",
            Outcome::NoOp => "noop",
        }
    }
}

/// Name of a node, or a terminal error for an object the API server would never return.
pub(crate) fn node_name(node: &Node) -> Result<&str, ControllerError> {
    node.metadata
        .name
        .as_deref()
        .ok_or_else(|| ControllerError::Terminal("node has no name".to_string()))
}
