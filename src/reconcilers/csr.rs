// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! cert-manager `CertificateRequest` signing.
//!
//! The controller acts as an external issuer for requests whose
//! `spec.issuerRef.group` matches the configured issuer group. An eligible
//! request is signed exactly once; after `status.certificate` is written (or
//! a terminal failure is recorded) every further reconcile is a no-op.
//!
//! ## Eligibility
//!
//! A request is skipped, without error, when any of these hold:
//!
//! - `spec.issuerRef.group` is not the configured issuer group
//! - `spec.isCA` is true
//! - `status.certificate` is already set
//! - the `Denied` condition is `True`
//! - `status.failureTime` is set
//!
//! ## Wire format
//!
//! `spec.request`, `status.certificate` and `status.ca` are base64-encoded
//! PEM, the encoding cert-manager uses for byte fields.

use super::scope::CallScope;
use super::status::{failed_status, issued_status};
use super::Outcome;
use crate::cluster::ClusterApi;
use crate::config::CsrOptions;
use crate::crd::CertificateRequest;
use crate::errors::{ControllerError, ErrorKind};
use crate::keystore::{CertType, IssueCertRequest, Keystore};
use crate::metrics;
use crate::status_reasons::{CONDITION_TYPE_DENIED, STATUS_TRUE};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use kube::ResourceExt;
use rcgen::{CertificateSigningRequestParams, SanType};
use tracing::{debug, info, warn};

/// Why a request was skipped, or `None` when it should be signed.
#[must_use]
pub fn ineligibility(request: &CertificateRequest, issuer_group: &str) -> Option<&'static str> {
    if request.spec.issuer_ref.group.as_deref() != Some(issuer_group) {
        return Some("addressed to another issuer");
    }
    if request.spec.is_ca {
        return Some("CA certificate requested");
    }
    if request.issued_certificate().is_some() {
        return Some("certificate already issued");
    }
    if request
        .condition(CONDITION_TYPE_DENIED)
        .is_some_and(|c| c.status == STATUS_TRUE)
    {
        return Some("request denied");
    }
    if request
        .status
        .as_ref()
        .is_some_and(|s| s.failure_time.is_some())
    {
        return Some("request already failed");
    }
    None
}

/// Map cert-manager usages to a certificate type.
///
/// Usages are compared case-insensitively with spaces and dashes ignored, so
/// `client auth`, `clientAuth` and `client-auth` are equivalent. A request
/// naming neither client nor server auth gets a server certificate.
#[must_use]
pub fn cert_type_from_usages(usages: &[String]) -> CertType {
    let normalized: Vec<String> = usages
        .iter()
        .map(|u| u.to_lowercase().replace([' ', '-'], ""))
        .collect();
    let client = normalized.iter().any(|u| u == "clientauth");
    let server = normalized.iter().any(|u| u == "serverauth");
    match (client, server) {
        (true, true) => CertType::ClientServer,
        (true, false) => CertType::Client,
        _ => CertType::Server,
    }
}

/// Decode `spec.request` into CSR parameters.
///
/// # Errors
///
/// Returns [`ControllerError::Terminal`] when the field is not base64, not
/// UTF-8, or not a parseable PEM `CERTIFICATE REQUEST`.
pub fn decode_request(encoded: &str) -> Result<CertificateSigningRequestParams, ControllerError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ControllerError::Terminal(format!("spec.request is not base64: {e}")))?;
    let pem = String::from_utf8(bytes)
        .map_err(|e| ControllerError::Terminal(format!("spec.request is not PEM text: {e}")))?;
    CertificateSigningRequestParams::from_pem(&pem)
        .map_err(|e| ControllerError::Terminal(format!("failed to parse CSR: {e}")))
}

fn dns_names(csr: &CertificateSigningRequestParams) -> Vec<String> {
    csr.params
        .subject_alt_names
        .iter()
        .filter_map(|san| match san {
            SanType::DnsName(name) => Some(name.as_str().to_string()),
            _ => None,
        })
        .collect()
}

/// Sign `request` if it is addressed to this issuer.
///
/// # Errors
///
/// - `Terminal` when the CSR is malformed or the keystore refuses to sign;
///   the failure is recorded on the request's status first
/// - `TransientCloud` when the keystore cannot be read
/// - cluster write failures as classified by [`ClusterApi`]
pub async fn reconcile_certificate_request(
    cluster: &dyn ClusterApi,
    keystore: &dyn Keystore,
    scope: &CallScope,
    options: &CsrOptions,
    request: &CertificateRequest,
) -> Result<Outcome, ControllerError> {
    let name = request.name_any();
    let namespace = request.namespace().unwrap_or_default();

    if let Some(reason) = ineligibility(request, &options.issuer_group) {
        debug!(namespace = %namespace, name = %name, reason, "skipping certificate request");
        return Ok(Outcome::NoOp);
    }

    let csr = match decode_request(&request.spec.request) {
        Ok(csr) => csr,
        Err(e) => {
            record_failure(cluster, scope, request, &namespace, &name, &e).await?;
            return Err(e);
        }
    };

    let issue = IssueCertRequest {
        signer: options.signer.clone(),
        cert_type: cert_type_from_usages(&request.spec.usages),
        subject: csr.params.distinguished_name.clone(),
        dns_names: dns_names(&csr),
        ip_addresses: Vec::new(),
        public_key: Some(csr.public_key),
        is_ca: false,
        validity_hours: options.validity_hours,
    };
    let cert_type = issue.cert_type;

    let issued = match scope
        .run("issue certificate", async {
            keystore.issue_cert(issue).await.map_err(ControllerError::from)
        })
        .await
    {
        Ok(issued) => issued,
        Err(e) if e.kind() == ErrorKind::Terminal => {
            record_failure(cluster, scope, request, &namespace, &name, &e).await?;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let status = issued_status(
        request.status.as_ref(),
        STANDARD.encode(issued.certificate_pem.as_bytes()),
        STANDARD.encode(issued.issuer_pem.as_bytes()),
    );
    scope
        .run(
            "patch certificate request status",
            cluster.patch_certificate_request_status(&namespace, &name, &status),
        )
        .await?;

    info!(
        namespace = %namespace,
        name = %name,
        signer = %options.signer,
        cert_type = ?cert_type,
        "issued certificate"
    );
    metrics::record_certificate_issued(&options.signer);
    Ok(Outcome::Patched)
}

async fn record_failure(
    cluster: &dyn ClusterApi,
    scope: &CallScope,
    request: &CertificateRequest,
    namespace: &str,
    name: &str,
    error: &ControllerError,
) -> Result<(), ControllerError> {
    warn!(namespace = %namespace, name = %name, error = %error, "certificate request failed");
    let status = failed_status(request.status.as_ref(), &error.to_string());
    scope
        .run(
            "patch certificate request status",
            cluster.patch_certificate_request_status(namespace, name, &status),
        )
        .await
}

#[cfg(test)]
#[path = "csr_tests.rs"]
mod csr_tests;
