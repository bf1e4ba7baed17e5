// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cluster.rs`

#[cfg(test)]
mod tests {
    use crate::cluster::ManagedConfigMap;
    use serde_json::json;

    #[test]
    fn test_apply_body_claims_only_hosts() {
        let cm = ManagedConfigMap {
            namespace: "kube-system".to_string(),
            name: "coredns".to_string(),
            hosts: "10.0.0.1\tapi.internal".to_string(),
        };

        assert_eq!(
            cm.apply_body(),
            json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": { "name": "coredns", "namespace": "kube-system" },
                "data": { "hosts": "10.0.0.1\tapi.internal" },
            })
        );
    }

    #[test]
    fn test_equal_payloads_compare_equal() {
        let a = ManagedConfigMap {
            namespace: "kube-system".to_string(),
            name: "coredns".to_string(),
            hosts: "10.0.0.1\tapi.internal".to_string(),
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.hosts.push_str(" kapi.internal");
        assert_ne!(a, b);
    }
}
