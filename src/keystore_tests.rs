// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `keystore.rs`

#[cfg(test)]
mod tests {
    use crate::errors::KeystoreError;
    use crate::keystore::{validity_window, CertType, FileKeystore, IssueCertRequest, Keystore};
    use crate::test_support::{make_csr_pem, pem_to_der, write_test_ca, write_test_leaf_as_keyset};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rcgen::{CertificateSigningRequestParams, DistinguishedName, DnType, DnValue};
    use std::collections::HashSet;
    use x509_parser::extensions::GeneralName;
    use x509_parser::prelude::*;

    fn subject(cn: &str) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, DnValue::Utf8String(cn.to_string()));
        dn
    }

    fn request(cert_type: CertType) -> IssueCertRequest {
        IssueCertRequest {
            signer: "kubernetes-ca".to_string(),
            cert_type,
            subject: subject("metrics-server"),
            dns_names: vec![
                "metrics-server".to_string(),
                "metrics-server.kube-system".to_string(),
            ],
            ip_addresses: Vec::new(),
            public_key: None,
            is_ca: false,
            validity_hours: 8760,
        }
    }

    fn ekus(pem_text: &str) -> (bool, bool) {
        let der = pem_to_der(pem_text);
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        let eku = cert.extended_key_usage().unwrap().unwrap().value;
        (eku.client_auth, eku.server_auth)
    }

    #[tokio::test]
    async fn test_find_keypair_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = FileKeystore::new(dir.path());
        assert!(keystore.find_keypair("kubernetes-ca").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_keypair_loads_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let ca_pem = write_test_ca(dir.path(), "kubernetes-ca");
        let keystore = FileKeystore::new(dir.path());

        let first = keystore.find_keypair("kubernetes-ca").await.unwrap().unwrap();
        assert_eq!(first.certificate_pem, ca_pem);
        assert!(!first.id.is_empty());
        assert!(first.id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        // removing the files does not matter once cached
        std::fs::remove_file(dir.path().join("kubernetes-ca.crt")).unwrap();
        let second = keystore.find_keypair("kubernetes-ca").await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_non_ca_keyset_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_test_leaf_as_keyset(dir.path(), "not-a-ca");
        let keystore = FileKeystore::new(dir.path());

        let err = keystore.find_keypair("not-a-ca").await.unwrap_err();
        assert!(matches!(err, KeystoreError::InvalidKeyMaterial { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_missing_key_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_test_ca(dir.path(), "kubernetes-ca");
        std::fs::remove_file(dir.path().join("kubernetes-ca.key")).unwrap();
        let keystore = FileKeystore::new(dir.path());

        let err = keystore.find_keypair("kubernetes-ca").await.unwrap_err();
        assert!(matches!(err, KeystoreError::InvalidKeyMaterial { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreadable_keystore_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the certificate file should be
        std::fs::create_dir(dir.path().join("kubernetes-ca.crt")).unwrap();
        let keystore = FileKeystore::new(dir.path());

        let err = keystore.find_keypair("kubernetes-ca").await.unwrap_err();
        assert!(matches!(err, KeystoreError::StorageUnavailable(_)), "{err}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_issue_client_server_with_supplied_key() {
        let dir = tempfile::tempdir().unwrap();
        let ca_pem = write_test_ca(dir.path(), "kubernetes-ca");
        let keystore = FileKeystore::new(dir.path());

        let csr_pem = make_csr_pem("metrics-server", &["metrics-server"]);
        let csr = CertificateSigningRequestParams::from_pem(&csr_pem).unwrap();
        let mut req = request(CertType::ClientServer);
        req.public_key = Some(csr.public_key);

        let issued = keystore.issue_cert(req).await.unwrap();
        assert!(issued.private_key_pem.is_none(), "no key generated for supplied public key");
        assert_eq!(issued.issuer_pem, ca_pem);
        assert_eq!(ekus(&issued.certificate_pem), (true, true));

        let der = pem_to_der(&issued.certificate_pem);
        let (_, leaf) = X509Certificate::from_der(&der).unwrap();

        // issued by the CA and not a CA itself
        let ca_der = pem_to_der(&ca_pem);
        let (_, ca) = X509Certificate::from_der(&ca_der).unwrap();
        assert_eq!(leaf.issuer(), ca.subject());
        assert!(!leaf.is_ca());

        // key pinned to the CSR's public key
        let csr_der = ::pem::parse(csr_pem.as_bytes()).unwrap();
        let (_, parsed_csr) =
            x509_parser::certification_request::X509CertificationRequest::from_der(
                csr_der.contents(),
            )
            .unwrap();
        assert_eq!(
            leaf.public_key().raw,
            parsed_csr.certification_request_info.subject_pki.raw
        );

        let names: HashSet<String> = leaf
            .subject_alternative_name()
            .unwrap()
            .unwrap()
            .value
            .general_names
            .iter()
            .filter_map(|n| match n {
                GeneralName::DNSName(d) => Some((*d).to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(
            names,
            HashSet::from([
                "metrics-server".to_string(),
                "metrics-server.kube-system".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_key_usage_per_type() {
        let dir = tempfile::tempdir().unwrap();
        write_test_ca(dir.path(), "kubernetes-ca");
        let keystore = FileKeystore::new(dir.path());

        let client = keystore.issue_cert(request(CertType::Client)).await.unwrap();
        assert_eq!(ekus(&client.certificate_pem), (true, false));
        let der = pem_to_der(&client.certificate_pem);
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        let ku = cert.key_usage().unwrap().unwrap().value;
        assert!(ku.digital_signature());
        assert!(!ku.key_encipherment());

        let server = keystore.issue_cert(request(CertType::Server)).await.unwrap();
        assert_eq!(ekus(&server.certificate_pem), (false, true));
        let der = pem_to_der(&server.certificate_pem);
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        let ku = cert.key_usage().unwrap().unwrap().value;
        assert!(ku.digital_signature());
        assert!(ku.key_encipherment());
    }

    #[tokio::test]
    async fn test_generates_key_when_none_supplied() {
        let dir = tempfile::tempdir().unwrap();
        write_test_ca(dir.path(), "kubernetes-ca");
        let keystore = FileKeystore::new(dir.path());

        let issued = keystore.issue_cert(request(CertType::Server)).await.unwrap();
        let key_pem = issued.private_key_pem.unwrap();
        assert!(key_pem.contains("PRIVATE KEY"));
    }

    #[tokio::test]
    async fn test_serials_are_unique_and_positive() {
        let dir = tempfile::tempdir().unwrap();
        write_test_ca(dir.path(), "kubernetes-ca");
        let keystore = FileKeystore::new(dir.path());

        let mut serials = HashSet::new();
        for _ in 0..10 {
            let issued = keystore.issue_cert(request(CertType::Client)).await.unwrap();
            let der = pem_to_der(&issued.certificate_pem);
            let (_, cert) = X509Certificate::from_der(&der).unwrap();
            let raw = cert.raw_serial();
            assert_eq!(raw.len(), 16);
            assert_eq!(raw[0] & 0x80, 0, "serial must be positive");
            serials.insert(raw.to_vec());
        }
        assert_eq!(serials.len(), 10);
    }

    #[tokio::test]
    async fn test_refuses_ca_requests() {
        let dir = tempfile::tempdir().unwrap();
        write_test_ca(dir.path(), "kubernetes-ca");
        let keystore = FileKeystore::new(dir.path());

        let mut req = request(CertType::ClientServer);
        req.is_ca = true;
        let err = keystore.issue_cert(req).await.unwrap_err();
        assert!(matches!(err, KeystoreError::PolicyViolation(_)));
    }

    #[tokio::test]
    async fn test_missing_signer() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = FileKeystore::new(dir.path());

        let err = keystore.issue_cert(request(CertType::Client)).await.unwrap_err();
        assert_eq!(err, KeystoreError::MissingSigner("kubernetes-ca".to_string()));
    }

    #[test]
    fn test_validity_rounds_up_to_days() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let issuer = Utc.with_ymd_and_hms(2035, 1, 1, 0, 0, 0).unwrap();

        let (start, end) = validity_window(today, 25, issuer).unwrap();
        assert_eq!(start, today);
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());

        let (_, end) = validity_window(today, 8760, issuer).unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn test_validity_capped_at_issuer_expiry() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let issuer = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();

        let (_, end) = validity_window(today, 8760, issuer).unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
    }

    #[test]
    fn test_expired_issuer_is_policy_violation() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let issuer = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        assert!(matches!(
            validity_window(today, 24, issuer),
            Err(KeystoreError::PolicyViolation(_))
        ));
    }
}
