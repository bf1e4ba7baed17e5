// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cloud/mod.rs`

#[cfg(test)]
mod tests {
    use crate::cloud::{CloudKind, InstanceIdentity, Role};
    use std::collections::BTreeMap;

    #[test]
    fn test_cloud_kind_parse() {
        assert_eq!("aws".parse::<CloudKind>().unwrap(), CloudKind::Aws);
        assert_eq!("GCE".parse::<CloudKind>().unwrap(), CloudKind::Gce);
        assert_eq!("scaleway".parse::<CloudKind>().unwrap(), CloudKind::Scaleway);
        assert_eq!("metal".parse::<CloudKind>().unwrap(), CloudKind::Metal);
        assert!("openstack".parse::<CloudKind>().is_err());
        assert_eq!(CloudKind::Metal.to_string(), "metal");
    }

    #[test]
    fn test_role_from_tag() {
        assert_eq!(Role::from_tag("master"), Some(Role::ControlPlane));
        assert_eq!(Role::from_tag("control-plane"), Some(Role::ControlPlane));
        assert_eq!(Role::from_tag("APIServer"), Some(Role::ApiServer));
        assert_eq!(Role::from_tag("node"), Some(Role::Node));
        assert_eq!(Role::from_tag("bastion"), Some(Role::Bastion));
        assert_eq!(Role::from_tag("worker"), None);
    }

    #[test]
    fn test_node_identity_labels() {
        let identity = InstanceIdentity::new("nodes-a", Role::Node, BTreeMap::new());
        assert_eq!(
            identity.labels,
            BTreeMap::from([
                ("kops.k8s.io/instancegroup".to_string(), "nodes-a".to_string()),
                ("node-role.kubernetes.io/node".to_string(), String::new()),
                ("kubernetes.io/role".to_string(), "node".to_string()),
            ])
        );
    }

    #[test]
    fn test_control_plane_identity_has_legacy_master_label() {
        let identity =
            InstanceIdentity::new("control-plane-us-east-1a", Role::ControlPlane, BTreeMap::new());
        assert_eq!(identity.labels["kubernetes.io/role"], "master");
        assert!(identity
            .labels
            .contains_key("node-role.kubernetes.io/control-plane"));
    }

    #[test]
    fn test_api_server_identity_has_no_legacy_label() {
        let identity = InstanceIdentity::new("apiserver", Role::ApiServer, BTreeMap::new());
        assert!(!identity.labels.contains_key("kubernetes.io/role"));
        assert!(identity.labels.contains_key("node-role.kubernetes.io/api-server"));
    }

    #[test]
    fn test_well_known_labels_override_template_labels() {
        let template = BTreeMap::from([
            ("kops.k8s.io/instancegroup".to_string(), "spoofed".to_string()),
            ("team".to_string(), "payments".to_string()),
        ]);
        let identity = InstanceIdentity::new("nodes-a", Role::Node, template);
        assert_eq!(identity.labels["kops.k8s.io/instancegroup"], "nodes-a");
        assert_eq!(identity.labels["team"], "payments");
    }
}
