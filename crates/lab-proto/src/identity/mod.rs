//! Credential provider: key pair, self-signed certificate, fingerprint.
//!
//! The server generates a fresh [`Credentials`] bundle on every start; clients
//! identify it by certificate [`Fingerprint`].

pub mod certificate;
pub mod credentials;
pub mod fingerprint;
pub mod keypair;

pub use certificate::Certificate;
pub use credentials::Credentials;
pub use fingerprint::Fingerprint;
pub use keypair::Keypair;
