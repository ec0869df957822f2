//! TLS configuration builders for the QUIC server and client endpoints.
//!
//! Both builders enforce TLS 1.3 (required by QUIC) on the ring provider and
//! set the ALPN protocol identifier. A client offering a different identifier
//! is rejected by the handshake itself.

use std::sync::Arc;

use crate::error::{ProtoError, Result};
use crate::identity::Credentials;
use crate::tls::verifier::LabServerCertVerifier;
use crate::trust::VerifyPolicy;

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build a `rustls::ServerConfig` presenting `credentials`.
///
/// Clients are not authenticated: the echo server serves anyone who
/// completes the handshake with a matching ALPN.
pub fn build_server_tls_config(
    credentials: &Credentials,
    alpn: &str,
) -> Result<rustls::ServerConfig> {
    let mut config = rustls::ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| ProtoError::TlsConfiguration(format!("TLS version config: {e}")))?
        .with_no_client_auth()
        .with_single_cert(credentials.cert_chain(), credentials.private_key()?)
        .map_err(|e| ProtoError::TlsConfiguration(format!("server cert config: {e}")))?;

    config.alpn_protocols = vec![alpn.as_bytes().to_vec()];

    Ok(config)
}

/// Build a `rustls::ClientConfig` that checks the server per `policy`.
pub fn build_client_tls_config(policy: VerifyPolicy, alpn: &str) -> Result<rustls::ClientConfig> {
    let mut config = rustls::ClientConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| ProtoError::TlsConfiguration(format!("TLS version config: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(LabServerCertVerifier::new(policy))
        .with_no_client_auth();

    config.alpn_protocols = vec![alpn.as_bytes().to_vec()];

    Ok(config)
}
