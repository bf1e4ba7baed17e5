// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom resource types read or written by the controller.
//!
//! # Resource Types
//!
//! - [`Host`] - Operator-provisioned record for a bare-metal machine (`kops.k8s.io/v1alpha2`)
//! - [`CertificateRequest`] - cert-manager signing request (`cert-manager.io/v1`)
//!
//! Neither resource is owned by this controller. `Host` is only read; a
//! `CertificateRequest` is read and its status subresource is written.
//!
//! # Example: Host
//!
//! ```yaml
//! apiVersion: kops.k8s.io/v1alpha2
//! kind: Host
//! metadata:
//!   name: metal-node-1
//!   namespace: kops-system
//!   labels:
//!     kops.k8s.io/instance-role: node
//! spec:
//!   instanceGroup: nodes-metal
//!   podCIDRs:
//!     - 2001:db8:1::/80
//! ```
//!
//! # Example: CertificateRequest
//!
//! ```yaml
//! apiVersion: cert-manager.io/v1
//! kind: CertificateRequest
//! metadata:
//!   name: metrics-server
//!   namespace: kube-system
//! spec:
//!   request: LS0tLS1CRUdJTiBDRVJUSUZJQ0FURSBSRVFVRVNULS0tLS0K...
//!   usages: [client auth, server auth]
//!   isCA: false
//!   issuerRef:
//!     name: kops-controller
//!     kind: ClusterIssuer
//!     group: kops.k8s.io
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g. `Ready`, `Denied`).
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

// ============================================================================
// Host
// ============================================================================

/// Bare-metal machine record, created by the cluster operator before the node joins.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "kops.k8s.io",
    version = "v1alpha2",
    kind = "Host",
    namespaced,
    doc = "Host describes a bare-metal machine that is allowed to join the cluster, along with its instance group and pre-allocated pod CIDRs."
)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    /// SSH public key the machine authenticates with when bootstrapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    /// Instance group the machine belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_group: Option<String>,

    /// Pod CIDRs assigned to the machine, at most one per address family.
    #[serde(default, rename = "podCIDRs", skip_serializing_if = "Vec::is_empty")]
    pub pod_cidrs: Vec<String>,
}

// ============================================================================
// CertificateRequest
// ============================================================================

/// Reference to the issuer a request is addressed to.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// See <https://cert-manager.io/docs/reference/api-docs/#cert-manager.io/v1.CertificateRequest>.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "cert-manager.io",
    version = "v1",
    kind = "CertificateRequest",
    namespaced,
    doc = "CertificateRequest is a request to sign a PKCS#10 CSR with a named issuer."
)]
#[kube(status = "CertificateRequestStatus")]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestSpec {
    /// Base64-encoded PEM `CERTIFICATE REQUEST`.
    pub request: String,

    /// Requested key usages, in cert-manager spelling (`client auth`, `server auth`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usages: Vec<String>,

    /// Whether the request asks for a CA certificate.
    #[serde(default, rename = "isCA")]
    pub is_ca: bool,

    /// Issuer the request is addressed to.
    pub issuer_ref: IssuerReference,

    /// Requested duration. Ignored: validity is issuer policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// `CertificateRequest` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestStatus {
    /// Base64-encoded PEM leaf certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,

    /// Base64-encoded PEM issuer certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Set when the request has failed permanently (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_time: Option<String>,
}

impl CertificateRequest {
    /// The issued certificate, if one has been written.
    #[must_use]
    pub fn issued_certificate(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.certificate.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// Look up a status condition by type.
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.iter().find(|c| c.r#type == condition_type))
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
