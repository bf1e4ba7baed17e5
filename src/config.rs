// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Startup configuration.
//!
//! The controller reads a single YAML file at startup (path given by `--conf`)
//! and turns it into a frozen [`Options`] value that is shared, read-only, by
//! every component. Nothing is reloaded after startup.
//!
//! # Example
//!
//! ```yaml
//! cloud: aws
//! enableCloudIPAM: true
//! hosts:
//!   configMap: kube-system/coredns
//!   controlPlaneHostnames: [api.internal.example.com, kops-controller.internal.example.com]
//!   apiServerHostnames: [api.internal.example.com]
//!   addressFamilies: [ipv6]
//! csr:
//!   issuerGroup: kops.k8s.io
//!   keystorePath: /etc/kubernetes/kops-controller/pki
//! ```

use crate::cloud::CloudKind;
use crate::constants::{
    DEFAULT_CERT_VALIDITY_HOURS, DEFAULT_CLOUD_CALL_TIMEOUT_SECS, DEFAULT_CONCURRENCY,
    DEFAULT_CONFIG_PATH, DEFAULT_GCE_COMPUTE_ENDPOINT, DEFAULT_GCE_METADATA_ENDPOINT,
    DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_SCALEWAY_API_ENDPOINT, DEFAULT_SIGNER,
};
use crate::ipfamily::IpFamily;
use anyhow::{anyhow, bail, Context as _, Result};
use clap::Parser;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "kops-controller", version, about = "In-cluster controller for kOps clusters")]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long = "conf", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Address the metrics and health server listens on
    #[arg(long, default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: SocketAddr,
}

// ============================================================================
// File format
// ============================================================================

/// On-disk configuration, exactly as written in the YAML file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub cloud: String,
    #[serde(default)]
    pub hosts: Option<HostsConfigFile>,
    #[serde(default)]
    pub csr: Option<CsrConfigFile>,
    #[serde(default, rename = "enableCloudIPAM")]
    pub enable_cloud_ipam: bool,
    #[serde(default)]
    pub concurrency: Option<u16>,
    #[serde(default)]
    pub cloud_call_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub aws: Option<AwsConfigFile>,
    #[serde(default)]
    pub gce: Option<GceConfigFile>,
    #[serde(default)]
    pub scaleway: Option<ScalewayConfigFile>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HostsConfigFile {
    pub config_map: String,
    #[serde(default)]
    pub control_plane_hostnames: Vec<String>,
    #[serde(default)]
    pub api_server_hostnames: Vec<String>,
    #[serde(default)]
    pub address_families: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CsrConfigFile {
    pub issuer_group: String,
    pub keystore_path: PathBuf,
    #[serde(default)]
    pub signer: Option<String>,
    #[serde(default)]
    pub validity_hours: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AwsConfigFile {
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GceConfigFile {
    #[serde(default)]
    pub compute_endpoint: Option<String>,
    #[serde(default)]
    pub metadata_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScalewayConfigFile {
    #[serde(default)]
    pub api_endpoint: Option<String>,
}

// ============================================================================
// Validated options
// ============================================================================

/// Namespaced name of the CoreDNS `ConfigMap` that receives the hosts table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigMapId {
    pub namespace: String,
    pub name: String,
}

impl FromStr for ConfigMapId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(ConfigMapId {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(anyhow!("configMap must be '<namespace>/<name>', got '{s}'")),
        }
    }
}

impl fmt::Display for ConfigMapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Settings for the hosts (CoreDNS) reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsOptions {
    pub config_map: ConfigMapId,
    pub control_plane_hostnames: Vec<String>,
    pub api_server_hostnames: Vec<String>,
    pub address_families: BTreeSet<IpFamily>,
}

/// Settings for the certificate-request reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrOptions {
    pub issuer_group: String,
    pub keystore_path: PathBuf,
    pub signer: String,
    pub validity_hours: u32,
}

/// Frozen startup configuration shared by every component.
#[derive(Debug, Clone)]
pub struct Options {
    pub cloud: CloudKind,
    /// `None` when no hostnames are configured (hosts reconciler disabled)
    pub hosts: Option<HostsOptions>,
    /// `None` when CSR signing is not configured
    pub csr: Option<CsrOptions>,
    pub enable_cloud_ipam: bool,
    pub concurrency: u16,
    pub cloud_call_timeout: Duration,
    pub aws_region: Option<String>,
    pub gce_compute_endpoint: String,
    pub gce_metadata_endpoint: String,
    pub scaleway_api_endpoint: String,
}

impl Options {
    /// Read and validate the YAML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("loading config file {}", path.display()))
    }

    /// Parse and validate configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or fails validation.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(raw).context("parsing YAML")?;
        Self::try_from(file)
    }
}

impl TryFrom<ConfigFile> for Options {
    type Error = anyhow::Error;

    fn try_from(file: ConfigFile) -> Result<Self> {
        let cloud: CloudKind = file.cloud.parse()?;

        let hosts = file.hosts.map(validate_hosts).transpose()?.flatten();
        let csr = file.csr.map(validate_csr).transpose()?;

        let concurrency = file.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            bail!("concurrency must be at least 1");
        }

        let timeout_secs = file
            .cloud_call_timeout_seconds
            .unwrap_or(DEFAULT_CLOUD_CALL_TIMEOUT_SECS);
        if timeout_secs == 0 {
            bail!("cloudCallTimeoutSeconds must be at least 1");
        }

        let gce = file.gce.unwrap_or_default();
        let scaleway = file.scaleway.unwrap_or_default();

        Ok(Options {
            cloud,
            hosts,
            csr,
            enable_cloud_ipam: file.enable_cloud_ipam,
            concurrency,
            cloud_call_timeout: Duration::from_secs(timeout_secs),
            aws_region: file.aws.and_then(|aws| aws.region),
            gce_compute_endpoint: gce
                .compute_endpoint
                .unwrap_or_else(|| DEFAULT_GCE_COMPUTE_ENDPOINT.to_string()),
            gce_metadata_endpoint: gce
                .metadata_endpoint
                .unwrap_or_else(|| DEFAULT_GCE_METADATA_ENDPOINT.to_string()),
            scaleway_api_endpoint: scaleway
                .api_endpoint
                .unwrap_or_else(|| DEFAULT_SCALEWAY_API_ENDPOINT.to_string()),
        })
    }
}

/// Returns `Ok(None)` when both hostname lists are empty: there is nothing to publish.
fn validate_hosts(file: HostsConfigFile) -> Result<Option<HostsOptions>> {
    let config_map: ConfigMapId = file.config_map.parse()?;

    let address_families = match file.address_families {
        None => BTreeSet::from([IpFamily::Ipv4, IpFamily::Ipv6]),
        Some(families) => families
            .iter()
            .map(|f| f.parse::<IpFamily>().map_err(|e| anyhow!(e)))
            .collect::<Result<BTreeSet<_>>>()?,
    };
    if address_families.is_empty() {
        bail!("hosts.addressFamilies must name at least one family");
    }

    if file.control_plane_hostnames.is_empty() && file.api_server_hostnames.is_empty() {
        return Ok(None);
    }

    Ok(Some(HostsOptions {
        config_map,
        control_plane_hostnames: file.control_plane_hostnames,
        api_server_hostnames: file.api_server_hostnames,
        address_families,
    }))
}

fn validate_csr(file: CsrConfigFile) -> Result<CsrOptions> {
    if file.issuer_group.trim().is_empty() {
        bail!("csr.issuerGroup must not be empty");
    }
    if file.keystore_path.as_os_str().is_empty() {
        bail!("csr.keystorePath must not be empty");
    }
    let validity_hours = file.validity_hours.unwrap_or(DEFAULT_CERT_VALIDITY_HOURS);
    if validity_hours == 0 {
        bail!("csr.validityHours must be at least 1");
    }

    Ok(CsrOptions {
        issuer_group: file.issuer_group,
        keystore_path: file.keystore_path,
        signer: file.signer.unwrap_or_else(|| DEFAULT_SIGNER.to_string()),
        validity_hours,
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
