//! SHA-256 certificate fingerprints.
//!
//! There is no PKI here: a peer is identified by the hash of the exact
//! certificate it presents. The server prints its fingerprint at startup and
//! a client can pin it (see [`VerifyPolicy::pinned`](crate::trust::VerifyPolicy::pinned)).

use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use sha2::{Digest, Sha256};

use crate::error::{ProtoError, Result};

/// SHA-256 over a DER-encoded certificate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    hash: [u8; 32],
}

impl Fingerprint {
    /// Hash a DER-encoded certificate.
    pub fn of_der(cert_der: &[u8]) -> Self {
        Self {
            hash: Sha256::digest(cert_der).into(),
        }
    }

    /// Parse a 64-character hex string. Colons and case are ignored, so the
    /// `AB:CD:...` form printed by most TLS tooling is accepted too.
    pub fn from_hex(s: &str) -> Result<Self> {
        let stripped: String = s.chars().filter(|c| *c != ':').collect();
        let bytes = HEXLOWER_PERMISSIVE
            .decode(stripped.as_bytes())
            .map_err(|e| ProtoError::InvalidFingerprint(format!("hex decode: {e}")))?;
        let hash: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ProtoError::InvalidFingerprint(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self { hash })
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.hash)
    }

    /// First 8 hex characters, for log lines.
    pub fn short_id(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.short_id())
    }
}
