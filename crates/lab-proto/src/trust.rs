//! Server certificate trust: which fingerprints a client accepts.
//!
//! The [`TrustStore`] trait abstracts where trusted fingerprints live.
//! [`MemoryTrustStore`] keeps them in memory, which is all a client that
//! pins a freshly printed server fingerprint needs.
//!
//! [`VerifyPolicy`] is the pluggable verification step:
//! - `Pinned`: the server's certificate fingerprint must be in the store.
//! - `SkipVerify`: any certificate is accepted. Handshake signatures are
//!   still checked, so the peer must hold the key for what it presents, but
//!   nothing ties that key to an expected identity. Test setups only.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::identity::Fingerprint;

/// Trait for checking and managing trusted certificate fingerprints.
///
/// Implementations must be `Send + Sync` so they can be shared via
/// `Arc<dyn TrustStore>` with TLS verifier callbacks.
pub trait TrustStore: Send + Sync {
    /// Returns `true` if the fingerprint is trusted.
    fn is_trusted(&self, fingerprint: &Fingerprint) -> bool;

    /// Add a fingerprint to the trusted set.
    fn trust(&self, fingerprint: Fingerprint);

    /// Remove a fingerprint from the trusted set. No-op if not present.
    fn untrust(&self, fingerprint: &Fingerprint);
}

/// In-memory trust store backed by `RwLock<HashSet<Fingerprint>>`.
#[derive(Default)]
pub struct MemoryTrustStore {
    trusted: RwLock<HashSet<Fingerprint>>,
}

impl MemoryTrustStore {
    /// Create an empty trust store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that trusts exactly the given fingerprints.
    pub fn with_trusted(fingerprints: impl IntoIterator<Item = Fingerprint>) -> Self {
        Self {
            trusted: RwLock::new(fingerprints.into_iter().collect()),
        }
    }
}

// A poisoned lock only means another thread panicked mid-insert; the set
// itself is still a valid set of fingerprints.
impl TrustStore for MemoryTrustStore {
    fn is_trusted(&self, fingerprint: &Fingerprint) -> bool {
        self.trusted
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(fingerprint)
    }

    fn trust(&self, fingerprint: Fingerprint) {
        self.trusted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(fingerprint);
    }

    fn untrust(&self, fingerprint: &Fingerprint) {
        self.trusted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(fingerprint);
    }
}

impl std::fmt::Debug for dyn TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn TrustStore")
    }
}

/// How the client decides whether to accept the server's certificate.
#[derive(Debug, Clone)]
pub enum VerifyPolicy {
    /// Accept only certificates whose fingerprint is in the store.
    Pinned(Arc<dyn TrustStore>),
    /// Accept any certificate. For tests and local experiments.
    SkipVerify,
}

impl VerifyPolicy {
    /// Pin a single fingerprint.
    pub fn pinned(fingerprint: Fingerprint) -> Self {
        VerifyPolicy::Pinned(Arc::new(MemoryTrustStore::with_trusted([fingerprint])))
    }

    /// Returns true if a certificate with this fingerprint is acceptable.
    pub fn accepts(&self, fingerprint: &Fingerprint) -> bool {
        match self {
            VerifyPolicy::Pinned(store) => store.is_trusted(fingerprint),
            VerifyPolicy::SkipVerify => true,
        }
    }

    pub fn is_skip_verify(&self) -> bool {
        matches!(self, VerifyPolicy::SkipVerify)
    }
}
