// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event filters.
//!
//! Node objects change on every kubelet heartbeat. The labeler and pod-CIDR
//! controllers only read labels, `spec.providerID` and `spec.podCIDR(s)`, so
//! their watch streams are filtered on [`node_fingerprint`] and a heartbeat
//! never costs a cloud call.
//!
//! The hosts table depends only on nodes carrying a control-plane or
//! apiserver role label. A node event is forwarded when the node is relevant
//! now, or when it contributed to the last table built (so that removing a
//! role label, or deleting the node, still triggers a rebuild).
//!
//! On metal, a `Host` record event is mapped to the node of the same name
//! with [`node_for_host`].

use crate::crd::Host;
use crate::labels::{ROLE_API_SERVER_LABEL, ROLE_CONTROL_PLANE_LABEL};
use k8s_openapi::api::core::v1::Node;
use kube::runtime::reflector::ObjectRef;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

/// Role labels whose holders are published in the hosts table.
pub const HOSTS_ROLE_LABELS: [&str; 2] = [ROLE_CONTROL_PLANE_LABEL, ROLE_API_SERVER_LABEL];

/// Whether `node` carries at least one hosts role label.
#[must_use]
pub fn has_hosts_role(node: &Node) -> bool {
    node.metadata
        .labels
        .as_ref()
        .is_some_and(|labels| HOSTS_ROLE_LABELS.iter().any(|l| labels.contains_key(*l)))
}

/// Hash of the node fields the labeler and pod-CIDR reconcilers read.
///
/// Used as a `predicate_filter` predicate: an event whose fingerprint equals
/// the previous one for the same node is dropped.
#[must_use]
pub fn node_fingerprint(node: &Node) -> Option<u64> {
    let mut hasher = DefaultHasher::new();
    node.metadata.labels.hash(&mut hasher);
    if let Some(spec) = &node.spec {
        spec.provider_id.hash(&mut hasher);
        spec.pod_cidr.hash(&mut hasher);
        spec.pod_cidrs.hash(&mut hasher);
    }
    Some(hasher.finish())
}

/// The node a `Host` record describes.
#[must_use]
pub fn node_for_host(host: &Host) -> Option<ObjectRef<Node>> {
    host.metadata.name.as_deref().map(ObjectRef::new)
}

/// Names of the nodes that went into the last hosts table.
#[derive(Debug, Default)]
pub struct TrackedNodes {
    names: RwLock<BTreeSet<String>>,
}

impl TrackedNodes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked set.
    pub fn replace(&self, names: BTreeSet<String>) {
        if let Ok(mut guard) = self.names.write() {
            *guard = names;
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.read().is_ok_and(|names| names.contains(name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.read().map_or(0, |names| names.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hosts predicate: relevant now, or relevant at the last rebuild.
#[must_use]
pub fn hosts_relevant(node: &Node, tracked: &TrackedNodes) -> bool {
    if has_hosts_role(node) {
        return true;
    }
    node.metadata
        .name
        .as_deref()
        .is_some_and(|name| tracked.contains(name))
}

#[cfg(test)]
#[path = "predicates_tests.rs"]
mod predicates_tests;
