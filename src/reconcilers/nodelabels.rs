// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node label reconciliation.
//!
//! Labels a node with its instance group and role as reported by the cloud.
//! The labeler is strictly additive: keys the cloud does not return are left
//! alone, and only keys that are missing or carry a different value are
//! written.

use super::scope::CallScope;
use super::{node_name, Outcome};
use crate::cloud::CloudProvider;
use crate::cluster::ClusterApi;
use crate::errors::{ControllerError, ErrorKind};
use crate::metrics;
use k8s_openapi::api::core::v1::Node;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Labels in `desired` that `current` lacks or holds with another value.
#[must_use]
pub fn label_diff(
    current: Option<&BTreeMap<String, String>>,
    desired: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    desired
        .iter()
        .filter(|(key, value)| current.and_then(|labels| labels.get(*key)) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Strategic-merge patch that sets exactly `labels`.
#[must_use]
pub fn labels_patch(labels: &BTreeMap<String, String>) -> Value {
    json!({ "metadata": { "labels": labels } })
}

/// Bring `node`'s labels in line with its cloud identity.
///
/// # Errors
///
/// Provider errors are returned unchanged. A node deleted between the event
/// and the patch is not an error.
pub async fn reconcile_node_labels(
    cluster: &dyn ClusterApi,
    cloud: &CloudProvider,
    scope: &CallScope,
    node: &Node,
) -> Result<Outcome, ControllerError> {
    let name = node_name(node)?;
    let identity = cloud.identify_node(scope, node).await?;

    let diff = label_diff(node.metadata.labels.as_ref(), &identity.labels);
    if diff.is_empty() {
        debug!(node = %name, "node labels up to date");
        return Ok(Outcome::NoOp);
    }

    let patch = labels_patch(&diff);
    match scope.run("patch node labels", cluster.patch_node(name, &patch)).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(node = %name, "node deleted before labels were applied");
            return Ok(Outcome::NoOp);
        }
        Err(e) => return Err(e),
    }

    info!(
        node = %name,
        instance_group = %identity.instance_group_name,
        labels = ?diff.keys().collect::<Vec<_>>(),
        "labeled node"
    );
    metrics::record_node_patch("labels");
    Ok(Outcome::Patched)
}

#[cfg(test)]
#[path = "nodelabels_tests.rs"]
mod nodelabels_tests;
