// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod CIDR assignment from the cloud's IPv6 prefix.
//!
//! Runs only when `enableCloudIPAM` is set. A node whose `spec.podCIDRs` is
//! already populated is never touched again, whatever the cloud says now.

use super::scope::CallScope;
use super::{node_name, Outcome};
use crate::cloud::CloudProvider;
use crate::cluster::ClusterApi;
use crate::errors::{ControllerError, ErrorKind};
use crate::metrics;
use k8s_openapi::api::core::v1::Node;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Whether the node already has a pod CIDR.
#[must_use]
pub fn has_pod_cidr(node: &Node) -> bool {
    node.spec.as_ref().is_some_and(|spec| {
        spec.pod_cidrs.as_ref().is_some_and(|cidrs| !cidrs.is_empty())
            || spec.pod_cidr.as_ref().is_some_and(|cidr| !cidr.is_empty())
    })
}

/// Patch setting `spec.podCIDR` to the first prefix and `spec.podCIDRs` to all of them.
#[must_use]
pub fn pod_cidr_patch(prefixes: &[String]) -> Value {
    json!({
        "spec": {
            "podCIDR": prefixes.first(),
            "podCIDRs": prefixes,
        }
    })
}

/// Assign `node`'s pod CIDR from the prefix bound to its instance.
///
/// # Errors
///
/// Provider errors are returned unchanged (`NotReady` while the node has no
/// provider ID). A node deleted before the patch is not an error.
pub async fn reconcile_pod_cidr(
    cluster: &dyn ClusterApi,
    cloud: &CloudProvider,
    scope: &CallScope,
    node: &Node,
) -> Result<Outcome, ControllerError> {
    let name = node_name(node)?;
    if has_pod_cidr(node) {
        debug!(node = %name, "pod CIDR already assigned");
        return Ok(Outcome::NoOp);
    }

    let prefixes = cloud.lookup_instance_ipv6_prefix(scope, node).await?;
    if prefixes.is_empty() {
        info!(node = %name, cloud = %cloud.kind(), "no pod CIDR recorded for node, leaving it unassigned");
        return Ok(Outcome::NoOp);
    }

    let patch = pod_cidr_patch(&prefixes);
    match scope.run("patch node podCIDR", cluster.patch_node(name, &patch)).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(node = %name, "node deleted before pod CIDR was applied");
            return Ok(Outcome::NoOp);
        }
        Err(e) => return Err(e),
    }

    info!(node = %name, pod_cidrs = ?prefixes, "assigned pod CIDR");
    metrics::record_node_patch("podCIDR");
    Ok(Outcome::Patched)
}

#[cfg(test)]
#[path = "podcidr_tests.rs"]
mod podcidr_tests;
