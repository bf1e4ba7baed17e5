// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! GCE identity and IPv6 prefix lookup via the Compute Engine REST API.
//!
//! Access tokens come from the instance metadata server and are cached until
//! shortly before they expire. One `compute.instances.get` call answers both
//! questions:
//!
//! - identity from the instance labels (`k8s-io-instance-group`,
//!   `k8s-io-role-<role>`), falling back to the
//!   `kops-k8s-io-instance-group-name` metadata item
//! - pod CIDR from `networkInterfaces[].ipv6AccessConfigs[]` as
//!   `<externalIpv6>/<externalIpv6PrefixLength>`

use super::http::{get_json, join_path, parse_endpoint};
use super::provider_id::{parse_gce, GceProviderId};
use super::{InstanceIdentity, Role};
use crate::constants::GCE_TOKEN_REFRESH_MARGIN_SECS;
use crate::errors::ControllerError;
use crate::labels::{GCE_LABEL_INSTANCE_GROUP, GCE_LABEL_ROLE_PREFIX, GCE_METADATA_INSTANCE_GROUP};
use crate::reconcilers::scope::CallScope;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;
use url::Url;

const TOKEN_PATH: [&str; 6] = [
    "computeMetadata",
    "v1",
    "instance",
    "service-accounts",
    "default",
    "token",
];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: DateTime<Utc>,
}

/// The subset of a Compute Engine instance the controller reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: InstanceMetadata,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InstanceMetadata {
    #[serde(default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default)]
    pub ipv6_access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    #[serde(default)]
    pub external_ipv6: Option<String>,
    #[serde(default)]
    pub external_ipv6_prefix_length: Option<u8>,
}

/// GCE provider.
pub struct GceProvider {
    client: reqwest::Client,
    compute_endpoint: Url,
    metadata_endpoint: Url,
    token: Mutex<Option<CachedToken>>,
}

impl GceProvider {
    /// # Errors
    ///
    /// Returns an error if either endpoint is not a valid URL.
    pub fn new(compute_endpoint: &str, metadata_endpoint: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            compute_endpoint: parse_endpoint(compute_endpoint)?,
            metadata_endpoint: parse_endpoint(metadata_endpoint)?,
            token: Mutex::new(None),
        })
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().ok()?;
        guard
            .as_ref()
            .filter(|t| Utc::now() < t.refresh_at)
            .map(|t| t.value.clone())
    }

    async fn access_token(&self, scope: &CallScope) -> Result<String, ControllerError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        const OPERATION: &str = "metadata.token";
        let url = join_path(&self.metadata_endpoint, &TOKEN_PATH)?;
        let request = self.client.get(url).header("Metadata-Flavor", "Google");
        let response: TokenResponse = scope.run(OPERATION, get_json(request, OPERATION)).await?;

        let refresh_at = Utc::now()
            + ChronoDuration::seconds(response.expires_in - GCE_TOKEN_REFRESH_MARGIN_SECS);
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(CachedToken {
                value: response.access_token.clone(),
                refresh_at,
            });
        }
        debug!(refresh_at = %refresh_at, "refreshed GCE access token");
        Ok(response.access_token)
    }

    async fn get_instance(
        &self,
        scope: &CallScope,
        id: &GceProviderId,
    ) -> Result<Instance, ControllerError> {
        const OPERATION: &str = "compute.instances.get";
        let token = self.access_token(scope).await?;
        let url = join_path(
            &self.compute_endpoint,
            &["projects", &id.project, "zones", &id.zone, "instances", &id.instance],
        )?;
        let request = self.client.get(url).bearer_auth(token);
        scope.run(OPERATION, get_json(request, OPERATION)).await
    }

    pub(super) async fn identify_node(
        &self,
        scope: &CallScope,
        provider_id: &str,
    ) -> Result<InstanceIdentity, ControllerError> {
        let id = parse_gce(provider_id)?;
        let instance = self.get_instance(scope, &id).await?;
        identity_from_instance(&id.instance, &instance)
    }

    pub(super) async fn lookup_instance_ipv6_prefix(
        &self,
        scope: &CallScope,
        provider_id: &str,
    ) -> Result<Vec<String>, ControllerError> {
        let id = parse_gce(provider_id)?;
        let instance = self.get_instance(scope, &id).await?;
        ipv6_prefix(&id.instance, &instance).map(|prefix| vec![prefix])
    }
}

/// The single IPv6 prefix across every interface of `instance`.
///
/// # Errors
///
/// `NotFound` when there is none, `Ambiguous` when there are several.
pub fn ipv6_prefix(name: &str, instance: &Instance) -> Result<String, ControllerError> {
    let prefixes: Vec<String> = instance
        .network_interfaces
        .iter()
        .flat_map(|nic| &nic.ipv6_access_configs)
        .filter_map(|ac| {
            let address = ac.external_ipv6.as_deref()?;
            let length = ac.external_ipv6_prefix_length?;
            Some(format!("{address}/{length}"))
        })
        .collect();

    match prefixes.as_slice() {
        [] => Err(ControllerError::NotFound(format!(
            "instance {name} has no external IPv6 prefix"
        ))),
        [prefix] => Ok(prefix.clone()),
        many => Err(ControllerError::Ambiguous(format!(
            "instance {name} has {} external IPv6 prefixes: {}",
            many.len(),
            many.join(", ")
        ))),
    }
}

/// Derive identity from instance labels and metadata.
///
/// # Errors
///
/// Returns [`ControllerError::Terminal`] when neither the label nor the metadata item names an instance group.
pub fn identity_from_instance(
    name: &str,
    instance: &Instance,
) -> Result<InstanceIdentity, ControllerError> {
    let instance_group = instance
        .labels
        .get(GCE_LABEL_INSTANCE_GROUP)
        .cloned()
        .or_else(|| {
            instance
                .metadata
                .items
                .iter()
                .find(|item| item.key == GCE_METADATA_INSTANCE_GROUP)
                .and_then(|item| item.value.clone())
        })
        .filter(|ig| !ig.is_empty())
        .ok_or_else(|| {
            ControllerError::Terminal(format!("instance {name} does not name an instance group"))
        })?;

    let role = instance
        .labels
        .keys()
        .filter_map(|k| k.strip_prefix(GCE_LABEL_ROLE_PREFIX))
        .find_map(Role::from_tag)
        .unwrap_or(Role::Node);

    Ok(InstanceIdentity::new(instance_group, role, BTreeMap::new()))
}

#[cfg(test)]
#[path = "gce_tests.rs"]
mod gce_tests;
