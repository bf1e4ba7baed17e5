// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the kOps controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Controller Identity
// ============================================================================

/// Field manager used for every server-side apply issued by this controller
pub const FIELD_MANAGER: &str = "kops-controller";

/// Namespace holding operator-provisioned `Host` records for bare-metal nodes
pub const KOPS_SYSTEM_NAMESPACE: &str = "kops-system";

/// Key inside the CoreDNS `ConfigMap` that carries the synthesized hosts table
pub const HOSTS_DATA_KEY: &str = "hosts";

/// Default path of the YAML configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/kubernetes/kops-controller/config/config.yaml";

// ============================================================================
// Controller Names (used in logs and metric labels)
// ============================================================================

/// Node-labeler controller name
pub const CONTROLLER_NODE_LABELS: &str = "node-labels";

/// Pod-CIDR controller name
pub const CONTROLLER_POD_CIDR: &str = "pod-cidr";

/// Hosts controller name
pub const CONTROLLER_HOSTS: &str = "hosts";

/// Certificate-request controller name
pub const CONTROLLER_CSR: &str = "certificate-request";

// ============================================================================
// Cluster API Groups
// ============================================================================

/// API group of the `Host` resource
pub const KOPS_API_GROUP: &str = "kops.k8s.io";

/// API group of cert-manager's `CertificateRequest`
pub const CERT_MANAGER_API_GROUP: &str = "cert-manager.io";

// ============================================================================
// PKI Constants
// ============================================================================

/// Default keyset used to sign certificate requests
pub const DEFAULT_SIGNER: &str = "kubernetes-ca";

/// Default validity for issued leaf certificates (1 year)
pub const DEFAULT_CERT_VALIDITY_HOURS: u32 = 8760;

/// Number of random bytes in a leaf serial number
pub const SERIAL_NUMBER_BYTES: usize = 16;

/// Keyset that signs cilium's etcd client certificate
pub const ETCD_CLIENTS_CA_CILIUM: &str = "etcd-clients-ca-cilium";

/// Base validity of node bootstrap certificates (455 days)
pub const BOOTSTRAP_BASE_VALIDITY_HOURS: u32 = 455 * 24;

/// Per-node skew added to bootstrap certificate validity (up to 30 days)
pub const BOOTSTRAP_VALIDITY_SKEW_HOURS: u32 = 30 * 24;

// ============================================================================
// Cloud Provider Constants
// ============================================================================

/// Default per-call deadline for cloud and cluster API calls (30 seconds)
pub const DEFAULT_CLOUD_CALL_TIMEOUT_SECS: u64 = 30;

/// Default Google Compute Engine API endpoint
pub const DEFAULT_GCE_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Default GCE metadata server endpoint (used for access tokens)
pub const DEFAULT_GCE_METADATA_ENDPOINT: &str = "http://metadata.google.internal";

/// Default Scaleway API endpoint
pub const DEFAULT_SCALEWAY_API_ENDPOINT: &str = "https://api.scaleway.com";

/// Environment variable holding the Scaleway secret key
pub const SCALEWAY_SECRET_KEY_ENV: &str = "SCW_SECRET_KEY";

/// Refresh GCE access tokens this long before they expire
pub const GCE_TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Base requeue delay for failed reconciles (1 second)
pub const REQUEUE_BASE_DELAY_SECS: u64 = 1;

/// Ceiling for the exponential requeue delay (5 minutes)
pub const REQUEUE_MAX_DELAY_SECS: u64 = 300;

/// Default number of concurrent reconciles per controller
pub const DEFAULT_CONCURRENCY: u16 = 1;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the Prometheus metrics HTTP server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
