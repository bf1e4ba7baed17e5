// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CA key material custody and leaf certificate issuance.
//!
//! The keystore is owned by the cluster-lifecycle tool and is read-only here.
//! On disk, a keyset named `<id>` is a pair of PEM files:
//!
//! ```text
//! <keystorePath>/<id>.crt   CA certificate (must carry basicConstraints CA:TRUE)
//! <keystorePath>/<id>.key   CA private key
//! ```
//!
//! # Issuance policy
//!
//! | Type | Key usage | Extended key usage |
//! |------|-----------|--------------------|
//! | `Client` | digitalSignature | clientAuth |
//! | `Server` | digitalSignature, keyEncipherment | serverAuth |
//! | `ClientServer` | digitalSignature, keyEncipherment | clientAuth, serverAuth |
//!
//! Validity is issuer policy: leaves are valid from the start of the current
//! UTC day for `validity_hours` (rounded up to whole days), and never past the
//! issuer's own expiry. CA certificates are never issued.

use crate::constants::SERIAL_NUMBER_BYTES;
use crate::errors::KeystoreError;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use rand::Rng;
use rcgen::{
    string::Ia5String, CertificateParams, DistinguishedName, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose, PublicKey, SanType, SerialNumber,
};
use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use x509_parser::prelude::*;

/// A CA certificate and its private key.
#[derive(Clone)]
pub struct Keypair {
    /// Lowercase hex serial of the certificate.
    pub id: String,
    /// PEM-encoded CA certificate.
    pub certificate_pem: String,
    private_key_pem: String,
    not_after: DateTime<Utc>,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("id", &self.id)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

impl Keypair {
    /// Validate and load a CA keypair from PEM text.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidKeyMaterial`] when either PEM does not
    /// parse or the certificate is not a CA.
    pub fn from_pem(name: &str, certificate_pem: &str, key_pem: &str) -> Result<Self, KeystoreError> {
        let invalid = |reason: String| KeystoreError::InvalidKeyMaterial {
            id: name.to_string(),
            reason,
        };

        let block = ::pem::parse(certificate_pem.as_bytes())
            .map_err(|e| invalid(format!("certificate is not PEM: {e}")))?;
        let (_, cert) = X509Certificate::from_der(block.contents())
            .map_err(|e| invalid(format!("certificate does not parse: {e}")))?;

        let is_ca = cert
            .basic_constraints()
            .map_err(|e| invalid(format!("bad basicConstraints: {e}")))?
            .is_some_and(|bc| bc.value.ca);
        if !is_ca {
            return Err(invalid("certificate is not a CA".to_string()));
        }

        KeyPair::from_pem(key_pem).map_err(|e| invalid(format!("private key does not parse: {e}")))?;

        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| invalid("notAfter out of range".to_string()))?;

        Ok(Keypair {
            id: cert.tbs_certificate.serial.to_str_radix(16),
            certificate_pem: certificate_pem.to_string(),
            private_key_pem: key_pem.to_string(),
            not_after,
        })
    }

    /// Expiry of the CA certificate.
    #[must_use]
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }
}

/// Leaf certificate flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertType {
    Client,
    Server,
    ClientServer,
}

impl CertType {
    fn key_usages(self) -> Vec<KeyUsagePurpose> {
        match self {
            CertType::Client => vec![KeyUsagePurpose::DigitalSignature],
            CertType::Server | CertType::ClientServer => vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
            ],
        }
    }

    fn extended_key_usages(self) -> Vec<ExtendedKeyUsagePurpose> {
        match self {
            CertType::Client => vec![ExtendedKeyUsagePurpose::ClientAuth],
            CertType::Server => vec![ExtendedKeyUsagePurpose::ServerAuth],
            CertType::ClientServer => vec![
                ExtendedKeyUsagePurpose::ClientAuth,
                ExtendedKeyUsagePurpose::ServerAuth,
            ],
        }
    }
}

/// Input to [`Keystore::issue_cert`].
pub struct IssueCertRequest {
    /// Keyset that signs the leaf.
    pub signer: String,
    pub cert_type: CertType,
    pub subject: DistinguishedName,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    /// Caller-supplied leaf public key. When absent a key is generated and returned.
    pub public_key: Option<PublicKey>,
    pub is_ca: bool,
    pub validity_hours: u32,
}

/// Output of [`Keystore::issue_cert`].
#[derive(Debug, Clone)]
pub struct IssuedCert {
    pub certificate_pem: String,
    /// Only present when the keystore generated the leaf key.
    pub private_key_pem: Option<String>,
    pub issuer_pem: String,
}

/// Read-only access to CA keysets.
#[async_trait]
pub trait Keystore: Send + Sync {
    /// Current primary keypair for keyset `id`, or `None` when the keyset does not exist.
    ///
    /// # Errors
    ///
    /// [`KeystoreError::StorageUnavailable`] on I/O failure,
    /// [`KeystoreError::InvalidKeyMaterial`] when the files exist but are unusable.
    async fn find_keypair(&self, id: &str) -> Result<Option<Arc<Keypair>>, KeystoreError>;

    /// Sign a leaf certificate with keyset `request.signer`.
    ///
    /// # Errors
    ///
    /// - [`KeystoreError::PolicyViolation`] when a CA is requested or the issuer has expired
    /// - [`KeystoreError::MissingSigner`] when the keyset does not exist
    /// - [`KeystoreError::StorageUnavailable`] when the keyset cannot be read
    async fn issue_cert(&self, request: IssueCertRequest) -> Result<IssuedCert, KeystoreError> {
        if request.is_ca {
            return Err(KeystoreError::PolicyViolation(
                "CA certificates are never issued".to_string(),
            ));
        }

        let keypair = self
            .find_keypair(&request.signer)
            .await?
            .ok_or_else(|| KeystoreError::MissingSigner(request.signer.clone()))?;

        let (not_before, not_after) =
            validity_window(Utc::now().date_naive(), request.validity_hours, keypair.not_after)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = request.subject;
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages = request.cert_type.key_usages();
        params.extended_key_usages = request.cert_type.extended_key_usages();
        params.serial_number = Some(random_serial());
        params.not_before = rcgen::date_time_ymd(
            not_before.year(),
            not_before.month() as u8,
            not_before.day() as u8,
        );
        params.not_after = rcgen::date_time_ymd(
            not_after.year(),
            not_after.month() as u8,
            not_after.day() as u8,
        );
        params.subject_alt_names = request
            .dns_names
            .iter()
            .map(|name| {
                Ia5String::try_from(name.clone())
                    .map(SanType::DnsName)
                    .map_err(|e| KeystoreError::PolicyViolation(format!("invalid DNS name '{name}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        params
            .subject_alt_names
            .extend(request.ip_addresses.iter().copied().map(SanType::IpAddress));

        let ca_key = KeyPair::from_pem(&keypair.private_key_pem).map_err(|e| {
            KeystoreError::InvalidKeyMaterial {
                id: request.signer.clone(),
                reason: e.to_string(),
            }
        })?;
        let issuer = Issuer::from_ca_cert_pem(&keypair.certificate_pem, &ca_key).map_err(|e| {
            KeystoreError::InvalidKeyMaterial {
                id: request.signer.clone(),
                reason: e.to_string(),
            }
        })?;

        let (leaf, private_key_pem) = match request.public_key {
            Some(public_key) => {
                let leaf = params
                    .signed_by(&public_key, &issuer)
                    .map_err(|e| KeystoreError::Signing(e.to_string()))?;
                (leaf, None)
            }
            None => {
                let leaf_key =
                    KeyPair::generate().map_err(|e| KeystoreError::Signing(e.to_string()))?;
                let leaf = params
                    .signed_by(&leaf_key, &issuer)
                    .map_err(|e| KeystoreError::Signing(e.to_string()))?;
                (leaf, Some(leaf_key.serialize_pem()))
            }
        };

        debug!(signer = %request.signer, issuer_id = %keypair.id, "signed leaf certificate");

        Ok(IssuedCert {
            certificate_pem: leaf.pem(),
            private_key_pem,
            issuer_pem: keypair.certificate_pem.clone(),
        })
    }
}

/// Keystore backed by a directory of PEM files. Keypairs are cached after the first read.
pub struct FileKeystore {
    path: PathBuf,
    cache: Mutex<HashMap<String, Arc<Keypair>>>,
}

impl FileKeystore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cached(&self, id: &str) -> Option<Arc<Keypair>> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(id).cloned())
    }
}

#[async_trait]
impl Keystore for FileKeystore {
    async fn find_keypair(&self, id: &str) -> Result<Option<Arc<Keypair>>, KeystoreError> {
        if let Some(keypair) = self.cached(id) {
            return Ok(Some(keypair));
        }

        let cert_path = self.path.join(format!("{id}.crt"));
        let key_path = self.path.join(format!("{id}.key"));

        let certificate_pem = match tokio::fs::read_to_string(&cert_path).await {
            Ok(pem) => pem,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(KeystoreError::StorageUnavailable(format!(
                    "{}: {e}",
                    cert_path.display()
                )))
            }
        };
        let key_pem = match tokio::fs::read_to_string(&key_path).await {
            Ok(pem) => pem,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(KeystoreError::InvalidKeyMaterial {
                    id: id.to_string(),
                    reason: format!("{} is missing", key_path.display()),
                })
            }
            Err(e) => {
                return Err(KeystoreError::StorageUnavailable(format!(
                    "{}: {e}",
                    key_path.display()
                )))
            }
        };

        let keypair = Arc::new(Keypair::from_pem(id, &certificate_pem, &key_pem)?);
        info!(keyset = %id, keypair_id = %keypair.id, "loaded keypair from keystore");

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(id.to_string(), Arc::clone(&keypair));
        }
        Ok(Some(keypair))
    }
}

/// Leaf validity as whole UTC days: `[today, today + ceil(hours / 24))`,
/// pulled back to the issuer's expiry day when it would outlive the issuer.
///
/// # Errors
///
/// Returns [`KeystoreError::PolicyViolation`] when the issuer has already expired.
pub fn validity_window(
    today: NaiveDate,
    validity_hours: u32,
    issuer_not_after: DateTime<Utc>,
) -> Result<(NaiveDate, NaiveDate), KeystoreError> {
    let days = u64::from(validity_hours.div_ceil(24).max(1));
    let issuer_day = issuer_not_after.date_naive();

    let end = today
        .checked_add_days(Days::new(days))
        .map_or(issuer_day, |end| end.min(issuer_day));

    if end <= today {
        return Err(KeystoreError::PolicyViolation(format!(
            "issuer expires at {issuer_not_after}"
        )));
    }
    Ok((today, end))
}

fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
    rand::rng().fill(&mut bytes);
    // positive, and minimally DER-encoded
    bytes[0] = (bytes[0] & 0x7f) | 0x40;
    SerialNumber::from(bytes.to_vec())
}

#[cfg(test)]
#[path = "keystore_tests.rs"]
mod keystore_tests;
