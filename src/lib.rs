// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # kops-controller - In-cluster controller for kOps clusters
//!
//! kops-controller runs on the control plane of a kOps-managed cluster and
//! keeps cluster objects in line with what the cloud knows about each
//! machine.
//!
//! ## Overview
//!
//! - **Node labels** - every `Node` gets its instance-group and role labels
//!   from the cloud (AWS, GCE, Scaleway or bare-metal `Host` records)
//! - **Pod CIDRs** - with cloud IPAM enabled, a `Node`'s pod CIDR is the IPv6
//!   prefix bound to its primary network interface
//! - **Hosts table** - control-plane and apiserver addresses are published
//!   into the CoreDNS `ConfigMap` as a hosts file
//! - **Certificate signing** - cert-manager `CertificateRequest`s addressed
//!   to this issuer are signed with the cluster CA
//!
//! ## Modules
//!
//! - [`reconcilers`] - Level-triggered reconciliation logic
//! - [`controllers`] - Watch, queue and requeue wiring around the reconcilers
//! - [`cloud`] - Cloud identity and IPAM providers
//! - [`keystore`] - CA custody and leaf issuance
//! - [`bootstrap`] - Named certificates for joining nodes
//! - [`cluster`] - The cluster reads and writes the controller performs
//! - [`config`] - Command line and YAML configuration
//! - [`crd`] - `Host` and `CertificateRequest` resource types
//! - [`metrics`] - Prometheus metrics and the health server
//!
//! ## Example
//!
//! ```rust,no_run
//! use kops_controller::config::Options;
//!
//! let options = Options::from_yaml(
//!     "cloud: aws\nhosts:\n  configMap: kube-system/coredns\n  controlPlaneHostnames: [api.internal.example.com]\n",
//! )
//! .unwrap();
//! assert!(options.hosts.is_some());
//! ```

pub mod bootstrap;
pub mod cloud;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod context;
pub mod controllers;
pub mod crd;
pub mod errors;
pub mod http_errors;
pub mod ipfamily;
pub mod keystore;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod status_reasons;

#[cfg(test)]
mod test_support;
