// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Well-known label and tag keys read or written by the controller.
//!
//! Node labels are what the labeler stamps onto `Node` objects; the cloud tag
//! keys are what the identity providers read from the instance.

// ============================================================================
// Node Labels
// ============================================================================

/// Label naming the kOps instance group a node belongs to
pub const INSTANCE_GROUP_LABEL: &str = "kops.k8s.io/instancegroup";

/// Role label carried by control-plane nodes
pub const ROLE_CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";

/// Role label carried by dedicated API server nodes
pub const ROLE_API_SERVER_LABEL: &str = "node-role.kubernetes.io/api-server";

/// Role label carried by worker nodes
pub const ROLE_NODE_LABEL: &str = "node-role.kubernetes.io/node";

/// Role label carried by bastion hosts
pub const ROLE_BASTION_LABEL: &str = "node-role.kubernetes.io/bastion";

/// Legacy role label (`master` or `node`), still read by older tooling
pub const LEGACY_ROLE_LABEL: &str = "kubernetes.io/role";

/// Legacy role value for control-plane nodes
pub const LEGACY_ROLE_MASTER: &str = "master";

/// Legacy role value for worker nodes
pub const LEGACY_ROLE_NODE: &str = "node";

// ============================================================================
// AWS Instance Tags
// ============================================================================

/// EC2 tag naming the instance group
pub const AWS_TAG_INSTANCE_GROUP: &str = "kops.k8s.io/instancegroup";

/// EC2 tag prefix carrying the role (`k8s.io/role/<role>`)
pub const AWS_TAG_ROLE_PREFIX: &str = "k8s.io/role/";

/// EC2 tag prefix carrying node-template labels
pub const AWS_TAG_NODE_LABEL_PREFIX: &str = "k8s.io/cluster-autoscaler/node-template/label/";

// ============================================================================
// GCE Instance Labels
// ============================================================================

/// GCE label naming the instance group
pub const GCE_LABEL_INSTANCE_GROUP: &str = "k8s-io-instance-group";

/// GCE label prefix carrying the role (`k8s-io-role-<role>`)
pub const GCE_LABEL_ROLE_PREFIX: &str = "k8s-io-role-";

/// GCE metadata item naming the instance group (older clusters)
pub const GCE_METADATA_INSTANCE_GROUP: &str = "kops-k8s-io-instance-group-name";

// ============================================================================
// Scaleway Server Tags
// ============================================================================

/// Scaleway tag prefix naming the instance group (`instance-group=<ig>`)
pub const SCALEWAY_TAG_INSTANCE_GROUP: &str = "instance-group";

/// Scaleway tag prefix naming the role (`role=<role>`)
pub const SCALEWAY_TAG_ROLE: &str = "role";

// ============================================================================
// Host Record Labels
// ============================================================================

/// Label on a `Host` record naming the role of the machine
pub const HOST_ROLE_LABEL: &str = "kops.k8s.io/instance-role";
