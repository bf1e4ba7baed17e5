// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for unit tests: an in-memory cluster, node builders and a throwaway CA.

use crate::cloud::aws::{AwsProvider, Ec2Api, NetworkInterface};
use crate::cloud::CloudProvider;
use crate::cluster::{ClusterApi, ManagedConfigMap};
use crate::crd::{CertificateRequestStatus, Host};
use crate::errors::ControllerError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, NodeAddress, NodeSpec, NodeStatus};
use kube::api::ObjectMeta;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, IsCa, KeyPair, KeyUsagePurpose,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Nodes
// ============================================================================

/// Builder for test `Node` objects.
#[derive(Default)]
pub struct NodeBuilder {
    name: String,
    labels: BTreeMap<String, String>,
    provider_id: Option<String>,
    internal_ips: Vec<String>,
    pod_cidrs: Vec<String>,
}

impl NodeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn provider_id(mut self, id: &str) -> Self {
        self.provider_id = Some(id.to_string());
        self
    }

    pub fn internal_ip(mut self, ip: &str) -> Self {
        self.internal_ips.push(ip.to_string());
        self
    }

    pub fn pod_cidrs(mut self, cidrs: &[&str]) -> Self {
        self.pod_cidrs = cidrs.iter().map(ToString::to_string).collect();
        self
    }

    pub fn build(self) -> Node {
        let mut addresses: Vec<NodeAddress> = self
            .internal_ips
            .into_iter()
            .map(|address| NodeAddress {
                address,
                type_: "InternalIP".to_string(),
            })
            .collect();
        addresses.push(NodeAddress {
            address: format!("{}.example.internal", self.name),
            type_: "Hostname".to_string(),
        });

        Node {
            metadata: ObjectMeta {
                name: Some(self.name),
                labels: Some(self.labels),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                provider_id: self.provider_id,
                pod_cidr: self.pod_cidrs.first().cloned(),
                pod_cidrs: if self.pod_cidrs.is_empty() {
                    None
                } else {
                    Some(self.pod_cidrs)
                },
                ..Default::default()
            }),
            status: Some(NodeStatus {
                addresses: Some(addresses),
                ..Default::default()
            }),
        }
    }
}

// ============================================================================
// In-memory cluster
// ============================================================================

/// `ClusterApi` implementation that keeps objects in memory and records every write.
#[derive(Default)]
pub struct FakeCluster {
    pub nodes: Mutex<Vec<Node>>,
    pub hosts: Mutex<HashMap<(String, String), Host>>,
    pub node_patches: Mutex<Vec<(String, Value)>>,
    pub config_map_applies: Mutex<Vec<ManagedConfigMap>>,
    pub status_patches: Mutex<Vec<(String, String, CertificateRequestStatus)>>,
    /// When set, the next write fails with this error (then clears).
    pub fail_next_write: Mutex<Option<ControllerError>>,
    /// When set, `list_nodes` fails with a transient error.
    pub fail_list: Mutex<bool>,
}

impl FakeCluster {
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            ..Default::default()
        }
    }

    pub fn set_nodes(&self, nodes: Vec<Node>) {
        *self.nodes.lock().unwrap() = nodes;
    }

    pub fn add_host(&self, namespace: &str, host: Host) {
        let name = host.metadata.name.clone().unwrap_or_default();
        self.hosts
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name), host);
    }

    pub fn node_patch_count(&self) -> usize {
        self.node_patches.lock().unwrap().len()
    }

    pub fn apply_count(&self) -> usize {
        self.config_map_applies.lock().unwrap().len()
    }

    fn take_write_failure(&self) -> Result<(), ControllerError> {
        match self.fail_next_write.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn selector_matches(node: &Node, selector: &str) -> bool {
    let labels = node.metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).is_some_and(|v| v == value),
            None => labels.contains_key(term),
        })
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>, ControllerError> {
        if *self.fail_list.lock().unwrap() {
            return Err(ControllerError::transient("list nodes", "connection reset"));
        }
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|node| selector_matches(node, label_selector))
            .cloned()
            .collect())
    }

    async fn patch_node(&self, name: &str, patch: &Value) -> Result<(), ControllerError> {
        self.take_write_failure()?;
        self.node_patches
            .lock()
            .unwrap()
            .push((name.to_string(), patch.clone()));
        Ok(())
    }

    async fn apply_config_map(&self, config_map: &ManagedConfigMap) -> Result<(), ControllerError> {
        self.take_write_failure()?;
        self.config_map_applies
            .lock()
            .unwrap()
            .push(config_map.clone());
        Ok(())
    }

    async fn get_host(&self, namespace: &str, name: &str) -> Result<Option<Host>, ControllerError> {
        Ok(self
            .hosts
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn patch_certificate_request_status(
        &self,
        namespace: &str,
        name: &str,
        status: &CertificateRequestStatus,
    ) -> Result<(), ControllerError> {
        self.take_write_failure()?;
        self.status_patches.lock().unwrap().push((
            namespace.to_string(),
            name.to_string(),
            status.clone(),
        ));
        Ok(())
    }
}

// ============================================================================
// Cloud
// ============================================================================

/// `Ec2Api` returning fixed interfaces and tags, counting calls.
#[derive(Default)]
pub struct StaticEc2 {
    pub interfaces: Vec<NetworkInterface>,
    pub tags: BTreeMap<String, String>,
    pub calls: AtomicUsize,
}

impl StaticEc2 {
    /// One ENI carrying `prefixes`, tagged into `instance_group` with `role`.
    pub fn new(instance_group: &str, role: &str, prefixes: &[&str]) -> Self {
        Self {
            interfaces: vec![NetworkInterface {
                id: "eni-0123456789abcdef0".to_string(),
                ipv6_prefixes: prefixes.iter().map(ToString::to_string).collect(),
            }],
            tags: BTreeMap::from([
                (
                    crate::labels::AWS_TAG_INSTANCE_GROUP.to_string(),
                    instance_group.to_string(),
                ),
                (
                    format!("{}{role}", crate::labels::AWS_TAG_ROLE_PREFIX),
                    "1".to_string(),
                ),
            ]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ec2Api for StaticEc2 {
    async fn network_interfaces(
        &self,
        _instance_id: &str,
    ) -> Result<Vec<NetworkInterface>, ControllerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.interfaces.clone())
    }

    async fn instance_tags(
        &self,
        _instance_id: &str,
    ) -> Result<BTreeMap<String, String>, ControllerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tags.clone())
    }
}

/// AWS provider backed by `ec2`.
pub fn aws_cloud(ec2: Arc<StaticEc2>) -> CloudProvider {
    CloudProvider::Aws(AwsProvider::new(ec2))
}

// ============================================================================
// PKI
// ============================================================================

/// Write a self-signed CA named `name` into `dir`; returns the certificate PEM.
pub fn write_test_ca(dir: &Path, name: &str) -> String {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(name.to_string()));
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2099, 1, 1);

    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();

    std::fs::write(dir.join(format!("{name}.crt")), cert.pem()).unwrap();
    std::fs::write(dir.join(format!("{name}.key")), key.serialize_pem()).unwrap();
    cert.pem()
}

/// Write a non-CA certificate under `name`, for negative tests.
pub fn write_test_leaf_as_keyset(dir: &Path, name: &str) {
    let params = CertificateParams::new(vec!["leaf.example.com".to_string()]).unwrap();
    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();

    std::fs::write(dir.join(format!("{name}.crt")), cert.pem()).unwrap();
    std::fs::write(dir.join(format!("{name}.key")), key.serialize_pem()).unwrap();
}

/// PEM `CERTIFICATE REQUEST` with CN `common_name` and the given DNS SANs.
pub fn make_csr_pem(common_name: &str, dns_names: &[&str]) -> String {
    let mut params =
        CertificateParams::new(dns_names.iter().map(ToString::to_string).collect::<Vec<_>>())
            .unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(common_name.to_string()));
    params.distinguished_name = dn;

    let key = KeyPair::generate().unwrap();
    params.serialize_request(&key).unwrap().pem().unwrap()
}

/// Decode a PEM certificate into DER bytes.
pub fn pem_to_der(pem_text: &str) -> Vec<u8> {
    ::pem::parse(pem_text.as_bytes()).unwrap().contents().to_vec()
}
