// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hosts table reconciliation.
//!
//! Publishes the internal addresses of control-plane and apiserver nodes into
//! `data.hosts` of the CoreDNS `ConfigMap`, so that in-cluster clients can
//! resolve the API server names without external DNS.
//!
//! # Algorithm
//!
//! The whole table is rebuilt from the current node list on every reconcile:
//!
//! 1. Each `InternalIP` of a control-plane node in an enabled family maps to
//!    every control-plane hostname.
//! 2. Each `InternalIP` of an apiserver node maps to every apiserver hostname.
//! 3. Names per address are sorted and deduplicated; lines are sorted by
//!    address and joined with `\n` (no trailing newline).
//!
//! The payload is applied only when it differs from the last one applied.
//!
//! # Example payload
//!
//! ```text
//! 10.0.0.1	api.internal kapi.internal
//! 10.0.0.2	api.internal
//! ```

use super::predicates::TrackedNodes;
use super::scope::CallScope;
use super::Outcome;
use crate::cluster::{ClusterApi, ManagedConfigMap};
use crate::config::HostsOptions;
use crate::errors::ControllerError;
use crate::ipfamily::{family, IpFamily};
use crate::labels::{ROLE_API_SERVER_LABEL, ROLE_CONTROL_PLANE_LABEL};
use crate::metrics;
use k8s_openapi::api::core::v1::Node;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// In-process state of the hosts controller.
///
/// The controller has a single reconcile key, so at most one reconcile
/// touches this at a time; the locks only satisfy `Sync`.
#[derive(Debug, Default)]
pub struct HostsState {
    last_applied: Mutex<Option<ManagedConfigMap>>,
    /// Nodes that fed the last table, consulted by the event predicate.
    pub tracked: TrackedNodes,
}

impl HostsState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn is_current(&self, desired: &ManagedConfigMap) -> bool {
        self.last_applied
            .lock()
            .is_ok_and(|last| last.as_ref() == Some(desired))
    }

    fn remember(&self, applied: ManagedConfigMap) {
        if let Ok(mut last) = self.last_applied.lock() {
            *last = Some(applied);
        }
    }

    /// The payload of the last successful apply.
    #[must_use]
    pub fn last_applied(&self) -> Option<ManagedConfigMap> {
        self.last_applied.lock().ok().and_then(|last| last.clone())
    }
}

/// `InternalIP` addresses of `node` whose family is enabled.
fn internal_addresses<'a>(
    node: &'a Node,
    families: &'a BTreeSet<IpFamily>,
) -> impl Iterator<Item = &'a str> + 'a {
    node.status
        .iter()
        .flat_map(|status| status.addresses.iter().flatten())
        .filter(|addr| addr.type_ == "InternalIP")
        .filter_map(move |addr| match family(&addr.address) {
            Ok(f) if families.contains(&f) => Some(addr.address.as_str()),
            Ok(_) => None,
            Err(e) => {
                warn!(
                    node = node.metadata.name.as_deref().unwrap_or_default(),
                    error = %e,
                    "skipping unparsable InternalIP"
                );
                None
            }
        })
}

/// Build the `data.hosts` payload.
///
/// Pure: the same node sets produce the same bytes regardless of order.
#[must_use]
pub fn build_hosts_payload(
    control_plane_nodes: &[Node],
    api_server_nodes: &[Node],
    options: &HostsOptions,
) -> String {
    let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let groups = [
        (control_plane_nodes, &options.control_plane_hostnames),
        (api_server_nodes, &options.api_server_hostnames),
    ];
    for (nodes, hostnames) in groups {
        if hostnames.is_empty() {
            continue;
        }
        for node in nodes {
            for address in internal_addresses(node, &options.address_families) {
                entries
                    .entry(address.to_string())
                    .or_default()
                    .extend(hostnames.iter().cloned());
            }
        }
    }

    entries
        .into_iter()
        .map(|(address, mut names)| {
            names.sort();
            names.dedup();
            format!("{address}\t{}", names.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rebuild the hosts table and apply it when it changed.
///
/// # Errors
///
/// Node list and apply failures are returned unchanged. The cache is only
/// updated after a successful apply, so a failed payload is retried as-is.
pub async fn reconcile_hosts(
    cluster: &dyn ClusterApi,
    scope: &CallScope,
    options: &HostsOptions,
    state: &HostsState,
) -> Result<Outcome, ControllerError> {
    let control_plane_nodes = scope
        .run("list control-plane nodes", cluster.list_nodes(ROLE_CONTROL_PLANE_LABEL))
        .await?;
    let api_server_nodes = scope
        .run("list apiserver nodes", cluster.list_nodes(ROLE_API_SERVER_LABEL))
        .await?;

    state.tracked.replace(
        control_plane_nodes
            .iter()
            .chain(&api_server_nodes)
            .filter_map(|node| node.metadata.name.clone())
            .collect(),
    );

    let desired = ManagedConfigMap {
        namespace: options.config_map.namespace.clone(),
        name: options.config_map.name.clone(),
        hosts: build_hosts_payload(&control_plane_nodes, &api_server_nodes, options),
    };

    if state.is_current(&desired) {
        debug!(config_map = %options.config_map, "hosts table unchanged");
        return Ok(Outcome::NoOp);
    }

    scope
        .run("apply hosts configmap", cluster.apply_config_map(&desired))
        .await?;

    info!(
        config_map = %options.config_map,
        entries = desired.hosts.lines().count(),
        "applied hosts table"
    );
    metrics::record_hosts_patch();
    state.remember(desired);
    Ok(Outcome::Patched)
}

#[cfg(test)]
#[path = "hosts_tests.rs"]
mod hosts_tests;
