//! Custom rustls server certificate verifier driven by [`VerifyPolicy`].
//!
//! The server's certificate is self-signed, so there is no chain to walk.
//! Instead the verifier hashes the presented leaf and asks the policy whether
//! that fingerprint is acceptable. Handshake signature checks are delegated
//! to the ring provider under every policy.

use std::sync::{Arc, LazyLock};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::{debug, warn};

use crate::identity::Fingerprint;
use crate::trust::VerifyPolicy;

/// Check a presented leaf certificate against the policy.
fn verify_server_leaf(
    end_entity: &CertificateDer<'_>,
    policy: &VerifyPolicy,
) -> Result<(), TlsError> {
    let fingerprint = Fingerprint::of_der(end_entity);

    if policy.is_skip_verify() {
        warn!(
            fingerprint = %fingerprint.short_id(),
            "accepting server certificate without verification"
        );
        return Ok(());
    }

    if !policy.accepts(&fingerprint) {
        return Err(TlsError::General(format!(
            "server certificate {} is not pinned",
            fingerprint.short_id()
        )));
    }

    debug!(fingerprint = %fingerprint.short_id(), "server certificate matches pin");
    Ok(())
}

/// The ring provider's supported signature verification algorithms.
fn ring_signature_algorithms() -> &'static rustls::crypto::WebPkiSupportedAlgorithms {
    static ALGORITHMS: LazyLock<rustls::crypto::WebPkiSupportedAlgorithms> = LazyLock::new(|| {
        rustls::crypto::ring::default_provider().signature_verification_algorithms
    });
    &ALGORITHMS
}

/// Client-side verifier for the server's self-signed certificate.
#[derive(Debug)]
pub struct LabServerCertVerifier {
    policy: VerifyPolicy,
}

impl LabServerCertVerifier {
    pub fn new(policy: VerifyPolicy) -> Arc<Self> {
        Arc::new(Self { policy })
    }
}

impl ServerCertVerifier for LabServerCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        verify_server_leaf(end_entity, &self.policy)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ring_signature_algorithms().supported_schemes()
    }
}
