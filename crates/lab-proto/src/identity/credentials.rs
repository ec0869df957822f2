//! The process-wide credential bundle.
//!
//! Built once at startup and handed by reference to whatever needs it; there
//! is no global. Failure here is fatal to the caller since nothing can be
//! secured without it.

use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::Result;
use crate::identity::{Certificate, Fingerprint, Keypair};

/// Key pair plus the self-signed certificate that wraps it.
pub struct Credentials {
    keypair: Keypair,
    certificate: Certificate,
}

impl Credentials {
    /// Generate fresh key material and a certificate valid from now.
    pub fn generate() -> Result<Self> {
        Self::generate_at(OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Generate fresh key material and a certificate valid from `now_epoch_secs`.
    pub fn generate_at(now_epoch_secs: i64) -> Result<Self> {
        let keypair = Keypair::generate();
        let certificate = Certificate::generate(&keypair, now_epoch_secs)?;
        debug!(fingerprint = %certificate.fingerprint(), "generated server credentials");
        Ok(Self {
            keypair,
            certificate,
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.certificate.fingerprint()
    }

    /// Single-entry chain for rustls.
    pub fn cert_chain(&self) -> Vec<CertificateDer<'static>> {
        vec![self.certificate.to_certificate_der()]
    }

    pub fn private_key(&self) -> Result<PrivateKeyDer<'static>> {
        self.keypair.to_private_key_der()
    }
}
