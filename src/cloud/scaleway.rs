// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scaleway identity and IPv6 lookup.
//!
//! Identity comes from the server tags (`instance-group=<ig>`, `role=<role>`)
//! returned by the Instance API. The pod CIDR is the server's public IPv6
//! block as reported by the IPAM API. Requests authenticate with the
//! `SCW_SECRET_KEY` environment variable.

use super::http::{get_json, join_path, parse_endpoint};
use super::provider_id::parse_scaleway;
use super::{InstanceIdentity, Role};
use crate::constants::SCALEWAY_SECRET_KEY_ENV;
use crate::errors::ControllerError;
use crate::labels::{SCALEWAY_TAG_INSTANCE_GROUP, SCALEWAY_TAG_ROLE};
use crate::reconcilers::scope::CallScope;
use anyhow::Context as _;
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Deserialize)]
struct ServerResponse {
    server: Server,
}

#[derive(Debug, Default, Deserialize)]
struct Server {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ListIpsResponse {
    #[serde(default)]
    ips: Vec<IpamIp>,
}

#[derive(Debug, Deserialize)]
struct IpamIp {
    address: String,
}

/// Scaleway provider.
pub struct ScalewayProvider {
    client: reqwest::Client,
    api_endpoint: Url,
    secret_key: String,
}

impl ScalewayProvider {
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL.
    pub fn new(api_endpoint: &str, secret_key: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_endpoint: parse_endpoint(api_endpoint)?,
            secret_key: secret_key.into(),
        })
    }

    /// Read the secret key from `SCW_SECRET_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or the endpoint is invalid.
    pub fn from_env(api_endpoint: &str) -> anyhow::Result<Self> {
        let secret_key = std::env::var(SCALEWAY_SECRET_KEY_ENV)
            .with_context(|| format!("{SCALEWAY_SECRET_KEY_ENV} must be set for cloud scaleway"))?;
        Self::new(api_endpoint, secret_key)
    }

    pub(super) async fn identify_node(
        &self,
        scope: &CallScope,
        provider_id: &str,
    ) -> Result<InstanceIdentity, ControllerError> {
        const OPERATION: &str = "instance.servers.get";
        let id = parse_scaleway(provider_id)?;
        let url = join_path(
            &self.api_endpoint,
            &["instance", "v1", "zones", &id.zone, "servers", &id.server_id],
        )?;
        let request = self.client.get(url).header("X-Auth-Token", &self.secret_key);
        let response: ServerResponse = scope.run(OPERATION, get_json(request, OPERATION)).await?;

        identity_from_tags(&id.server_id, &response.server.tags)
    }

    pub(super) async fn lookup_instance_ipv6_prefix(
        &self,
        scope: &CallScope,
        provider_id: &str,
    ) -> Result<Vec<String>, ControllerError> {
        const OPERATION: &str = "ipam.ips.list";
        let id = parse_scaleway(provider_id)?;
        let mut url = join_path(
            &self.api_endpoint,
            &["ipam", "v1", "regions", id.region(), "ips"],
        )?;
        url.query_pairs_mut()
            .append_pair("resource_id", &id.server_id)
            .append_pair("resource_type", "instance_server")
            .append_pair("is_ipv6", "true");

        let request = self.client.get(url).header("X-Auth-Token", &self.secret_key);
        let response: ListIpsResponse = scope.run(OPERATION, get_json(request, OPERATION)).await?;

        match response.ips.as_slice() {
            [] => Err(ControllerError::NotFound(format!(
                "server {} has no IPv6 address in IPAM",
                id.server_id
            ))),
            [ip] => Ok(vec![ip.address.clone()]),
            many => Err(ControllerError::Ambiguous(format!(
                "server {} has {} IPv6 addresses in IPAM",
                id.server_id,
                many.len()
            ))),
        }
    }
}

/// Derive identity from `key=value` server tags.
///
/// # Errors
///
/// Returns [`ControllerError::Terminal`] when no `instance-group=` tag is present.
pub fn identity_from_tags(
    server_id: &str,
    tags: &[String],
) -> Result<InstanceIdentity, ControllerError> {
    let tag_value = |key: &str| {
        tags.iter()
            .filter_map(|tag| tag.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    };

    let instance_group = tag_value(SCALEWAY_TAG_INSTANCE_GROUP)
        .filter(|ig| !ig.is_empty())
        .ok_or_else(|| {
            ControllerError::Terminal(format!(
                "server {server_id} has no {SCALEWAY_TAG_INSTANCE_GROUP}= tag"
            ))
        })?;
    let role = tag_value(SCALEWAY_TAG_ROLE)
        .as_deref()
        .and_then(Role::from_tag)
        .unwrap_or(Role::Node);

    Ok(InstanceIdentity::new(instance_group, role, BTreeMap::new()))
}

#[cfg(test)]
#[path = "scaleway_tests.rs"]
mod scaleway_tests;
