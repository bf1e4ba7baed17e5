// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud identity and IPAM providers.
//!
//! A [`CloudProvider`] answers two questions about a `Node`:
//!
//! - **identify_node**: which instance group is it in, what role does it have,
//!   and which labels should it carry
//! - **lookup_instance_ipv6_prefix**: which IPv6 prefix is bound to its primary
//!   network interface (used as its pod CIDR)
//!
//! The variant is selected once at startup from the `cloud` config key.
//! Providers hold a client handle established at construction and no other
//! state, so one provider is shared by every reconciler.

pub mod aws;
pub mod gce;
mod http;
pub mod metal;
pub mod provider_id;
pub mod scaleway;

use crate::cluster::ClusterApi;
use crate::config::Options;
use crate::errors::ControllerError;
use crate::labels::{
    INSTANCE_GROUP_LABEL, LEGACY_ROLE_LABEL, LEGACY_ROLE_MASTER, LEGACY_ROLE_NODE,
    ROLE_API_SERVER_LABEL, ROLE_BASTION_LABEL, ROLE_CONTROL_PLANE_LABEL, ROLE_NODE_LABEL,
};
use crate::reconcilers::node_name;
use crate::reconcilers::scope::CallScope;
use anyhow::{bail, Result};
use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The `cloud` config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudKind {
    Aws,
    Gce,
    Scaleway,
    Metal,
}

impl FromStr for CloudKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(CloudKind::Aws),
            "gce" => Ok(CloudKind::Gce),
            "scaleway" => Ok(CloudKind::Scaleway),
            "metal" => Ok(CloudKind::Metal),
            other => bail!("unsupported cloud '{other}' (expected aws, gce, scaleway or metal)"),
        }
    }
}

impl fmt::Display for CloudKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CloudKind::Aws => "aws",
            CloudKind::Gce => "gce",
            CloudKind::Scaleway => "scaleway",
            CloudKind::Metal => "metal",
        })
    }
}

/// Role of an instance group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    ControlPlane,
    ApiServer,
    Node,
    Bastion,
}

impl Role {
    /// Parse a role as spelled in cloud tags (`control-plane`, `master`, `apiserver`, ...).
    #[must_use]
    pub fn from_tag(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "control-plane" | "controlplane" | "master" => Some(Role::ControlPlane),
            "apiserver" | "api-server" => Some(Role::ApiServer),
            "node" => Some(Role::Node),
            "bastion" => Some(Role::Bastion),
            _ => None,
        }
    }

    /// `node-role.kubernetes.io/<role>` label key.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Role::ControlPlane => ROLE_CONTROL_PLANE_LABEL,
            Role::ApiServer => ROLE_API_SERVER_LABEL,
            Role::Node => ROLE_NODE_LABEL,
            Role::Bastion => ROLE_BASTION_LABEL,
        }
    }

    fn legacy_label_value(self) -> Option<&'static str> {
        match self {
            Role::ControlPlane => Some(LEGACY_ROLE_MASTER),
            Role::Node => Some(LEGACY_ROLE_NODE),
            Role::ApiServer | Role::Bastion => None,
        }
    }
}

/// What a cloud knows about the instance behind a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub instance_group_name: String,
    pub role: Role,
    /// Every label the node should carry, including the instance-group and role labels.
    pub labels: BTreeMap<String, String>,
}

impl InstanceIdentity {
    /// Build an identity from cloud-side node-template labels plus the well-known
    /// instance-group and role labels. Well-known labels win over template labels.
    #[must_use]
    pub fn new(
        instance_group_name: impl Into<String>,
        role: Role,
        template_labels: BTreeMap<String, String>,
    ) -> Self {
        let instance_group_name = instance_group_name.into();
        let mut labels = template_labels;
        labels.insert(INSTANCE_GROUP_LABEL.to_string(), instance_group_name.clone());
        labels.insert(role.label().to_string(), String::new());
        if let Some(legacy) = role.legacy_label_value() {
            labels.insert(LEGACY_ROLE_LABEL.to_string(), legacy.to_string());
        }
        Self {
            instance_group_name,
            role,
            labels,
        }
    }
}

/// The configured cloud.
pub enum CloudProvider {
    Aws(aws::AwsProvider),
    Gce(gce::GceProvider),
    Scaleway(scaleway::ScalewayProvider),
    Metal(metal::MetalProvider),
}

impl CloudProvider {
    /// Construct the provider named by `options.cloud`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cloud client cannot be configured (e.g. missing credentials).
    pub async fn from_options(options: &Options, cluster: Arc<dyn ClusterApi>) -> Result<Self> {
        Ok(match options.cloud {
            CloudKind::Aws => CloudProvider::Aws(
                aws::AwsProvider::from_env(options.aws_region.clone()).await,
            ),
            CloudKind::Gce => CloudProvider::Gce(gce::GceProvider::new(
                &options.gce_compute_endpoint,
                &options.gce_metadata_endpoint,
            )?),
            CloudKind::Scaleway => CloudProvider::Scaleway(scaleway::ScalewayProvider::from_env(
                &options.scaleway_api_endpoint,
            )?),
            CloudKind::Metal => CloudProvider::Metal(metal::MetalProvider::new(cluster)),
        })
    }

    #[must_use]
    pub fn kind(&self) -> CloudKind {
        match self {
            CloudProvider::Aws(_) => CloudKind::Aws,
            CloudProvider::Gce(_) => CloudKind::Gce,
            CloudProvider::Scaleway(_) => CloudKind::Scaleway,
            CloudProvider::Metal(_) => CloudKind::Metal,
        }
    }

    /// Resolve the node's instance group, role and labels.
    ///
    /// # Errors
    ///
    /// - `NotReady` when the node has no provider ID (or, on metal, no Host record)
    /// - `Terminal` when the provider ID is malformed or the instance carries no instance group
    /// - cloud call failures as classified by the provider
    pub async fn identify_node(
        &self,
        scope: &CallScope,
        node: &Node,
    ) -> Result<InstanceIdentity, ControllerError> {
        let provider_id = provider_id::provider_id(node)?;
        match self {
            CloudProvider::Aws(p) => p.identify_node(scope, provider_id).await,
            CloudProvider::Gce(p) => p.identify_node(scope, provider_id).await,
            CloudProvider::Scaleway(p) => p.identify_node(scope, provider_id).await,
            CloudProvider::Metal(p) => p.identify_node(scope, node_name(node)?).await,
        }
    }

    /// IPv6 prefixes bound to the instance's primary interface.
    ///
    /// Every cloud variant returns exactly one prefix or an error; metal may
    /// return an empty list when the Host record carries no CIDRs.
    ///
    /// # Errors
    ///
    /// - `NotReady` when the node has no provider ID (or, on metal, no Host record)
    /// - `Ambiguous` when the cloud reports more than one interface or prefix
    /// - `NotFound` when the cloud reports no prefix
    pub async fn lookup_instance_ipv6_prefix(
        &self,
        scope: &CallScope,
        node: &Node,
    ) -> Result<Vec<String>, ControllerError> {
        let provider_id = provider_id::provider_id(node)?;
        match self {
            CloudProvider::Aws(p) => p.lookup_instance_ipv6_prefix(scope, provider_id).await,
            CloudProvider::Gce(p) => p.lookup_instance_ipv6_prefix(scope, provider_id).await,
            CloudProvider::Scaleway(p) => p.lookup_instance_ipv6_prefix(scope, provider_id).await,
            CloudProvider::Metal(p) => p.lookup_instance_ipv6_prefix(scope, node_name(node)?).await,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
