// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bare-metal provider.
//!
//! There is no cloud to ask. An operator creates a `Host` record named after
//! the node in `kops-system` before the machine joins; identity and pod
//! CIDRs are read from it.

use super::{InstanceIdentity, Role};
use crate::cluster::ClusterApi;
use crate::constants::KOPS_SYSTEM_NAMESPACE;
use crate::crd::Host;
use crate::errors::ControllerError;
use crate::labels::HOST_ROLE_LABEL;
use crate::reconcilers::scope::CallScope;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct MetalProvider {
    cluster: Arc<dyn ClusterApi>,
}

impl MetalProvider {
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    async fn host(&self, scope: &CallScope, node_name: &str) -> Result<Host, ControllerError> {
        scope
            .run(
                "get host",
                self.cluster.get_host(KOPS_SYSTEM_NAMESPACE, node_name),
            )
            .await?
            .ok_or_else(|| {
                ControllerError::NotReady(format!(
                    "no Host record {KOPS_SYSTEM_NAMESPACE}/{node_name}"
                ))
            })
    }

    pub(super) async fn identify_node(
        &self,
        scope: &CallScope,
        node_name: &str,
    ) -> Result<InstanceIdentity, ControllerError> {
        let host = self.host(scope, node_name).await?;
        identity_from_host(node_name, &host)
    }

    /// The Host's `spec.podCIDRs`, possibly empty.
    pub(super) async fn lookup_instance_ipv6_prefix(
        &self,
        scope: &CallScope,
        node_name: &str,
    ) -> Result<Vec<String>, ControllerError> {
        let host = self.host(scope, node_name).await?;
        Ok(host.spec.pod_cidrs)
    }
}

/// Identity from `spec.instanceGroup` and the `kops.k8s.io/instance-role` label.
///
/// # Errors
///
/// Returns [`ControllerError::Terminal`] when the Host names no instance group.
pub fn identity_from_host(node_name: &str, host: &Host) -> Result<InstanceIdentity, ControllerError> {
    let instance_group = host
        .spec
        .instance_group
        .clone()
        .filter(|ig| !ig.is_empty())
        .ok_or_else(|| {
            ControllerError::Terminal(format!(
                "Host {KOPS_SYSTEM_NAMESPACE}/{node_name} has no spec.instanceGroup"
            ))
        })?;

    let role = host
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(HOST_ROLE_LABEL))
        .and_then(|value| Role::from_tag(value))
        .unwrap_or(Role::Node);

    Ok(InstanceIdentity::new(instance_group, role, BTreeMap::new()))
}

#[cfg(test)]
#[path = "metal_tests.rs"]
mod metal_tests;
