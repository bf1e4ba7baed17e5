// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node bootstrap certificates.
//!
//! A joining node whose identity has already been verified asks for a set of
//! named certificates, one per public key it generated. Each name maps to a
//! fixed signer, certificate type and subject:
//!
//! | Name | Signer | Type | Subject |
//! |------|--------|------|---------|
//! | `kubelet` | `kubernetes-ca` | client | `CN=system:node:<node>, O=system:nodes` |
//! | `kubelet-server` | `kubernetes-ca` | server | `CN=<node>`, SANs from the node identity |
//! | `kube-proxy` | `kubernetes-ca` | client | `CN=system:kube-proxy` |
//! | `kube-router` | `kubernetes-ca` | client | `CN=system:kube-router` |
//! | `machine-key` | `kubernetes-ca` | client | `CN=kops:machine:<node>, O=kops:machines` |
//! | `etcd-client-cilium` | `etcd-clients-ca-cilium` | client | `CN=cilium` |
//!
//! Only names enabled at construction are issued. When the node sends the
//! keypair IDs it was provisioned with, the ID for the certificate's signer
//! must equal the keystore's current primary keypair.

use crate::constants::{
    BOOTSTRAP_BASE_VALIDITY_HOURS, BOOTSTRAP_VALIDITY_SKEW_HOURS, DEFAULT_SIGNER,
    ETCD_CLIENTS_CA_CILIUM,
};
use crate::errors::BootstrapError;
use crate::keystore::{CertType, IssueCertRequest, Keystore};
use rcgen::{DistinguishedName, DnType, DnValue, PublicKey};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

pub const CERT_KUBELET: &str = "kubelet";
pub const CERT_KUBELET_SERVER: &str = "kubelet-server";
pub const CERT_KUBE_PROXY: &str = "kube-proxy";
pub const CERT_KUBE_ROUTER: &str = "kube-router";
pub const CERT_MACHINE_KEY: &str = "machine-key";
pub const CERT_ETCD_CLIENT_CILIUM: &str = "etcd-client-cilium";

const NODES_GROUP: &str = "system:nodes";
const MACHINES_GROUP: &str = "kops:machines";

/// A node whose identity has been verified by the bootstrap authenticator.
#[derive(Debug, Clone, Default)]
pub struct NodeIdentity {
    pub node_name: String,
    /// Names the kubelet serving certificate must cover: DNS names or IP literals.
    pub certificate_names: Vec<String>,
}

/// Signer, type and subject a certificate name resolves to.
#[derive(Debug, Clone)]
pub struct CertTemplate {
    pub signer: &'static str,
    pub cert_type: CertType,
    pub subject: DistinguishedName,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

fn subject(common_name: impl Into<String>, organization: Option<&str>) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(common_name.into()));
    if let Some(org) = organization {
        dn.push(DnType::OrganizationName, DnValue::Utf8String(org.to_string()));
    }
    dn
}

/// Resolve certificate `name` for `identity`.
///
/// # Errors
///
/// Returns [`BootstrapError::UnknownName`] for a name outside the table above.
pub fn cert_template(name: &str, identity: &NodeIdentity) -> Result<CertTemplate, BootstrapError> {
    let node = &identity.node_name;
    let client = |signer, subject| CertTemplate {
        signer,
        cert_type: CertType::Client,
        subject,
        dns_names: Vec::new(),
        ip_addresses: Vec::new(),
    };

    let template = match name {
        CERT_KUBELET => client(
            DEFAULT_SIGNER,
            subject(format!("system:node:{node}"), Some(NODES_GROUP)),
        ),
        CERT_KUBELET_SERVER => {
            let (ips, dns): (Vec<_>, Vec<_>) = identity
                .certificate_names
                .iter()
                .partition(|n| n.parse::<IpAddr>().is_ok());
            CertTemplate {
                signer: DEFAULT_SIGNER,
                cert_type: CertType::Server,
                subject: subject(node.clone(), None),
                dns_names: dns.into_iter().cloned().collect(),
                ip_addresses: ips.iter().filter_map(|ip| ip.parse().ok()).collect(),
            }
        }
        CERT_KUBE_PROXY => client(DEFAULT_SIGNER, subject("system:kube-proxy", None)),
        CERT_KUBE_ROUTER => client(DEFAULT_SIGNER, subject("system:kube-router", None)),
        CERT_MACHINE_KEY => client(
            DEFAULT_SIGNER,
            subject(format!("kops:machine:{node}"), Some(MACHINES_GROUP)),
        ),
        CERT_ETCD_CLIENT_CILIUM => client(ETCD_CLIENTS_CA_CILIUM, subject("cilium", None)),
        other => return Err(BootstrapError::UnknownName(other.to_string())),
    };
    Ok(template)
}

/// Validity for a node's bootstrap certificates.
///
/// 455 days plus up to 30 days derived from the requester's address, so that
/// nodes created together expire apart while one node's certificates expire
/// together.
#[must_use]
pub fn bootstrap_validity_hours(remote_addr: &str) -> u32 {
    BOOTSTRAP_BASE_VALIDITY_HOURS + fnv1_32(remote_addr.as_bytes()) % BOOTSTRAP_VALIDITY_SKEW_HOURS
}

// 32-bit FNV-1
fn fnv1_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5, |hash: u32, byte| {
        hash.wrapping_mul(0x0100_0193) ^ u32::from(*byte)
    })
}

/// One named certificate requested by a node.
pub struct BootstrapCertRequest {
    pub name: String,
    pub public_key: PublicKey,
    pub validity_hours: u32,
}

/// Issues node bootstrap certificates from the keystore.
pub struct BootstrapIssuer {
    keystore: Arc<dyn Keystore>,
    enabled: BTreeSet<String>,
}

impl BootstrapIssuer {
    #[must_use]
    pub fn new(keystore: Arc<dyn Keystore>, enabled: impl IntoIterator<Item = String>) -> Self {
        Self {
            keystore,
            enabled: enabled.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// Issue one certificate; returns the leaf PEM.
    ///
    /// `keypair_ids` maps signer to the keypair ID the node was provisioned
    /// with. An empty map skips the check.
    ///
    /// # Errors
    ///
    /// - [`BootstrapError::NotEnabled`] or [`BootstrapError::UnknownName`] for the name
    /// - [`BootstrapError::KeypairMismatch`] when the node expects another CA keypair
    /// - [`BootstrapError::Keystore`] when issuance fails
    pub async fn issue(
        &self,
        identity: &NodeIdentity,
        request: BootstrapCertRequest,
        keypair_ids: &BTreeMap<String, String>,
    ) -> Result<String, BootstrapError> {
        if !self.is_enabled(&request.name) {
            return Err(BootstrapError::NotEnabled(request.name));
        }
        let template = cert_template(&request.name, identity)?;

        if !keypair_ids.is_empty() {
            self.check_keypair_id(template.signer, keypair_ids).await?;
        }

        let issued = self
            .keystore
            .issue_cert(IssueCertRequest {
                signer: template.signer.to_string(),
                cert_type: template.cert_type,
                subject: template.subject,
                dns_names: template.dns_names,
                ip_addresses: template.ip_addresses,
                public_key: Some(request.public_key),
                is_ca: false,
                validity_hours: request.validity_hours,
            })
            .await?;

        info!(
            node = %identity.node_name,
            name = %request.name,
            signer = template.signer,
            "issued bootstrap certificate"
        );
        Ok(issued.certificate_pem)
    }

    async fn check_keypair_id(
        &self,
        signer: &str,
        keypair_ids: &BTreeMap<String, String>,
    ) -> Result<(), BootstrapError> {
        let current = self
            .keystore
            .find_keypair(signer)
            .await?
            .map(|keypair| keypair.id.clone())
            .unwrap_or_default();
        let requested = keypair_ids.get(signer).cloned().unwrap_or_default();

        if requested != current {
            return Err(BootstrapError::KeypairMismatch {
                signer: signer.to_string(),
                requested,
                current,
            });
        }
        debug!(signer, keypair_id = %current, "bootstrap keypair ID matches");
        Ok(())
    }
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod bootstrap_tests;
