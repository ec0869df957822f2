//! Self-signed X.509 server certificate generation.
//!
//! The server wraps its Ed25519 key in a self-signed certificate valid for one
//! year, naming both `localhost` and `127.0.0.1` so that a client dialing the
//! loopback address by either name sees a matching SAN.
//!
//! Reference: `rcgen` crate (rustls team, MIT/Apache-2.0)
//! <https://github.com/rustls/rcgen>

use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair as RcgenKeyPair,
    KeyUsagePurpose, PKCS_ED25519, SerialNumber,
};
use rustls_pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use time::OffsetDateTime;

use crate::error::{ProtoError, Result};
use crate::identity::fingerprint::Fingerprint;
use crate::identity::keypair::Keypair;

/// Certificate validity duration in days.
pub const VALIDITY_DAYS: i64 = 365;

/// Organization written into the certificate subject.
pub const ORGANIZATION: &str = "QUIC Learning Lab";

/// Serial number. Certificates are regenerated per run, never reissued.
pub const SERIAL: u8 = 1;

/// Subject alternative names: loopback IP and hostname.
pub const SUBJECT_ALT_NAMES: [&str; 2] = ["127.0.0.1", "localhost"];

/// A self-signed X.509 certificate wrapping an Ed25519 key.
pub struct Certificate {
    cert_der: Vec<u8>,
    cert_pem: String,
    not_before_epoch: i64,
    not_after_epoch: i64,
}

impl Certificate {
    /// Generate a self-signed certificate for `keypair`, valid for
    /// [`VALIDITY_DAYS`] starting at `now_epoch_secs`.
    pub fn generate(keypair: &Keypair, now_epoch_secs: i64) -> Result<Self> {
        let pkcs8_der = keypair.to_pkcs8_der()?;
        let pkcs8_typed = PrivatePkcs8KeyDer::from(pkcs8_der);
        let rcgen_keypair = RcgenKeyPair::from_pkcs8_der_and_sign_algo(&pkcs8_typed, &PKCS_ED25519)
            .map_err(|e| ProtoError::CertificateGeneration(e.to_string()))?;

        let not_before_epoch = now_epoch_secs;
        let not_after_epoch = now_epoch_secs + VALIDITY_DAYS * 86400;

        let not_before = OffsetDateTime::from_unix_timestamp(not_before_epoch)
            .map_err(|e| ProtoError::CertificateGeneration(format!("invalid not_before: {e}")))?;
        let not_after = OffsetDateTime::from_unix_timestamp(not_after_epoch)
            .map_err(|e| ProtoError::CertificateGeneration(format!("invalid not_after: {e}")))?;

        let sans: Vec<String> = SUBJECT_ALT_NAMES.iter().map(|s| s.to_string()).collect();
        let mut params = CertificateParams::new(sans)
            .map_err(|e| ProtoError::CertificateGeneration(format!("invalid cert params: {e}")))?;

        let mut subject = DistinguishedName::new();
        subject.push(DnType::OrganizationName, ORGANIZATION);
        subject.push(DnType::CommonName, "localhost");
        params.distinguished_name = subject;
        params.serial_number = Some(SerialNumber::from_slice(&[SERIAL]));
        params.not_before = not_before;
        params.not_after = not_after;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

        let cert = params
            .self_signed(&rcgen_keypair)
            .map_err(|e| ProtoError::CertificateGeneration(e.to_string()))?;

        Ok(Self {
            cert_der: cert.der().to_vec(),
            cert_pem: cert.pem(),
            not_before_epoch,
            not_after_epoch,
        })
    }

    /// Returns the DER-encoded certificate bytes.
    pub fn der(&self) -> &[u8] {
        &self.cert_der
    }

    /// Returns an owned rustls certificate handle.
    pub fn to_certificate_der(&self) -> CertificateDer<'static> {
        CertificateDer::from(self.cert_der.clone())
    }

    /// Returns the PEM-encoded certificate string.
    pub fn pem(&self) -> &str {
        &self.cert_pem
    }

    /// SHA-256 fingerprint of the DER encoding.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_der(&self.cert_der)
    }

    pub fn not_before_epoch(&self) -> i64 {
        self.not_before_epoch
    }

    pub fn not_after_epoch(&self) -> i64 {
        self.not_after_epoch
    }
}
