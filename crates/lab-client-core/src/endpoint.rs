//! QUIC client endpoint.
//!
//! `ClientEndpoint` wraps a quinn client endpoint and dials the server once;
//! the resulting connection is then reused for every stream of the session.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use lab_proto::config::LabConfig;
use lab_proto::tls::config::build_client_tls_config;
use lab_proto::transport::LabConnection;
use lab_proto::trust::VerifyPolicy;
use tracing::info;

use crate::error::{ClientError, Result};

/// A QUIC client endpoint.
pub struct ClientEndpoint {
    endpoint: quinn::Endpoint,
    server_name: String,
}

impl ClientEndpoint {
    /// Create a client endpoint on an ephemeral IPv4 port.
    ///
    /// `policy` decides whether the server's certificate is accepted; the
    /// ALPN identifier and transport limits come from `config`.
    pub fn new(policy: VerifyPolicy, config: &LabConfig) -> Result<Self> {
        Self::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)), policy, config)
    }

    /// Create a client endpoint matching the address family of `server`.
    pub fn for_server(
        server: SocketAddr,
        policy: VerifyPolicy,
        config: &LabConfig,
    ) -> Result<Self> {
        let bind_addr = if server.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        Self::bind(bind_addr, policy, config)
    }

    fn bind(bind_addr: SocketAddr, policy: VerifyPolicy, config: &LabConfig) -> Result<Self> {
        config.validate()?;
        let rustls_config = build_client_tls_config(policy, &config.alpn)?;

        let quic_client_config = quinn::crypto::rustls::QuicClientConfig::try_from(rustls_config)
            .map_err(|e| ClientError::TlsConfig(format!("rustls→quinn: {e}")))?;

        let mut client_config = quinn::ClientConfig::new(Arc::new(quic_client_config));
        client_config.transport_config(config.transport_config()?);

        let mut endpoint =
            quinn::Endpoint::client(bind_addr).map_err(|e| ClientError::Endpoint(e.to_string()))?;
        endpoint.set_default_client_config(client_config);

        Ok(Self {
            endpoint,
            server_name: config.server_name.clone(),
        })
    }

    /// Connect to the server and wait for the handshake to finish.
    pub async fn dial(&self, server_addr: SocketAddr) -> Result<LabConnection> {
        let connecting = self.endpoint.connect(server_addr, &self.server_name)?;
        let quinn_conn = connecting.await?;
        let conn = LabConnection::new(quinn_conn);

        info!(conn = conn.id(), peer = %conn.remote_addr(), "connected");

        Ok(conn)
    }

    /// Wait until all connections on the endpoint are drained, so the
    /// server sees the close before the process exits.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}
