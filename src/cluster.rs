// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster resource surface.
//!
//! Reconcilers never hold a `kube::Client` directly; they go through
//! [`ClusterApi`], which exposes exactly the reads and writes the controller
//! is allowed to perform:
//!
//! - `Node`: list, strategic-merge patch of `metadata.labels` and `spec.podCIDR(s)`
//! - `ConfigMap`: server-side apply of `data.hosts` only, conflicts forced
//! - `Host`: get
//! - `CertificateRequest`: merge patch of the status subresource
//!
//! Every method returns a classified [`ControllerError`].

use crate::constants::{FIELD_MANAGER, HOSTS_DATA_KEY};
use crate::crd::{CertificateRequest, CertificateRequestStatus, Host};
use crate::errors::ControllerError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Node};
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde_json::{json, Value};
use tracing::debug;

/// The slice of a `ConfigMap` this controller claims ownership of.
///
/// Doubles as the hosts reconciler's cache entry: two values that compare
/// equal produce byte-identical apply bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedConfigMap {
    pub namespace: String,
    pub name: String,
    pub hosts: String,
}

impl ManagedConfigMap {
    /// Server-side apply body: `apiVersion`, `kind`, `metadata.{name,namespace}` and `data.hosts`.
    #[must_use]
    pub fn apply_body(&self) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": self.name,
                "namespace": self.namespace,
            },
            "data": {
                HOSTS_DATA_KEY: self.hosts,
            },
        })
    }
}

/// Reads and writes the controller performs against the cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List nodes matching a label selector (`""` lists every node).
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>, ControllerError>;

    /// Strategic-merge patch a node.
    async fn patch_node(&self, name: &str, patch: &Value) -> Result<(), ControllerError>;

    /// Server-side apply the managed fields of a `ConfigMap`.
    async fn apply_config_map(&self, config_map: &ManagedConfigMap) -> Result<(), ControllerError>;

    /// Fetch a `Host` record, `None` when absent.
    async fn get_host(&self, namespace: &str, name: &str) -> Result<Option<Host>, ControllerError>;

    /// Replace the status of a `CertificateRequest`.
    async fn patch_certificate_request_status(
        &self,
        namespace: &str,
        name: &str,
        status: &CertificateRequestStatus,
    ) -> Result<(), ControllerError>;
}

/// [`ClusterApi`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>, ControllerError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let lp = ListParams::default().labels(label_selector);
        let nodes = api
            .list(&lp)
            .await
            .map_err(|e| ControllerError::from_kube("nodes", e))?;
        Ok(nodes.items)
    }

    async fn patch_node(&self, name: &str, patch: &Value) -> Result<(), ControllerError> {
        let api: Api<Node> = Api::all(self.client.clone());
        api.patch(name, &PatchParams::default(), &Patch::Strategic(patch))
            .await
            .map_err(|e| ControllerError::from_kube(&format!("node/{name}"), e))?;
        debug!(node = %name, "patched node");
        Ok(())
    }

    async fn apply_config_map(&self, config_map: &ManagedConfigMap) -> Result<(), ControllerError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &config_map.namespace);
        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&config_map.name, &params, &Patch::Apply(config_map.apply_body()))
            .await
            .map_err(|e| {
                ControllerError::from_kube(
                    &format!("configmap/{}/{}", config_map.namespace, config_map.name),
                    e,
                )
            })?;
        Ok(())
    }

    async fn get_host(&self, namespace: &str, name: &str) -> Result<Option<Host>, ControllerError> {
        let api: Api<Host> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| ControllerError::from_kube(&format!("host/{namespace}/{name}"), e))
    }

    async fn patch_certificate_request_status(
        &self,
        namespace: &str,
        name: &str,
        status: &CertificateRequestStatus,
    ) -> Result<(), ControllerError> {
        let api: Api<CertificateRequest> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| {
                ControllerError::from_kube(&format!("certificaterequest/{namespace}/{name}"), e)
            })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
