//! Ed25519 key pair generation.
//!
//! All cryptographic operations are delegated to `ed25519-dalek`. The key
//! pair only lives in memory: it is generated at startup and discarded with
//! the process.

use ed25519_dalek::{SigningKey, pkcs8::EncodePrivateKey};
use rand::rngs::OsRng;
use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::error::{ProtoError, Result};

/// The signing key behind a server certificate.
///
/// The inner [`SigningKey`] is zeroized on drop.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Returns the PKCS#8 DER encoding (RFC 8410), as expected by `rcgen`.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let doc = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| ProtoError::KeyGeneration(e.to_string()))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Returns the private key in the form rustls wants for `with_single_cert`.
    pub fn to_private_key_der(&self) -> Result<PrivateKeyDer<'static>> {
        let pkcs8 = PrivatePkcs8KeyDer::from(self.to_pkcs8_der()?);
        Ok(PrivateKeyDer::Pkcs8(pkcs8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs8_der_is_nonempty() {
        let kp = Keypair::generate();
        let der = kp.to_pkcs8_der().expect("PKCS#8 export should succeed");
        assert!(!der.is_empty());
    }

    #[test]
    fn private_key_der_is_pkcs8() {
        let kp = Keypair::generate();
        let key = kp.to_private_key_der().expect("key export");
        assert!(matches!(key, PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn different_keypairs_differ() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        assert_ne!(
            kp1.to_pkcs8_der().expect("key export"),
            kp2.to_pkcs8_der().expect("key export")
        );
    }
}
