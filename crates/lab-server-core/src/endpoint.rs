//! QUIC server endpoint.
//!
//! `ServerEndpoint` wraps a quinn server endpoint, binding to a local address
//! with the process credentials and accepting incoming connections.

use std::net::SocketAddr;
use std::sync::Arc;

use lab_proto::config::LabConfig;
use lab_proto::identity::Credentials;
use lab_proto::tls::config::build_server_tls_config;
use lab_proto::transport::LabConnection;
use tracing::{debug, info};

use crate::error::{Result, ServerError};

/// A QUIC server endpoint that accepts incoming connections.
pub struct ServerEndpoint {
    endpoint: quinn::Endpoint,
}

impl ServerEndpoint {
    /// Bind a QUIC server to `addr`, presenting `credentials`.
    ///
    /// ALPN, idle timeout and stream limits come from `config`.
    pub fn bind(addr: SocketAddr, credentials: &Credentials, config: &LabConfig) -> Result<Self> {
        let rustls_config = build_server_tls_config(credentials, &config.alpn)?;

        let quic_server_config = quinn::crypto::rustls::QuicServerConfig::try_from(rustls_config)
            .map_err(|e| ServerError::TlsConfig(format!("rustls→quinn: {e}")))?;

        let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(quic_server_config));
        server_config.transport_config(config.transport_config()?);

        let endpoint = quinn::Endpoint::server(server_config, addr)
            .map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;

        info!(%addr, alpn = %config.alpn, "server endpoint bound");

        Ok(Self { endpoint })
    }

    /// Wait for the next connection attempt, without running its handshake.
    ///
    /// Returns [`ServerError::EndpointClosed`] once the endpoint is closed.
    /// The handshake is left to [`handshake`](Self::handshake) so that a slow
    /// peer only holds up its own task.
    pub async fn accept_incoming(&self) -> Result<quinn::Incoming> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or(ServerError::EndpointClosed)?;

        debug!(peer = %incoming.remote_address(), "incoming connection");
        Ok(incoming)
    }

    /// Complete the handshake of one connection attempt.
    ///
    /// A failure here is [`ServerError::Handshake`] and concerns this peer only.
    pub async fn handshake(incoming: quinn::Incoming) -> Result<LabConnection> {
        let quinn_conn = incoming.await?;
        let conn = LabConnection::new(quinn_conn);

        debug!(conn = conn.id(), peer = %conn.remote_addr(), "handshake complete");

        Ok(conn)
    }

    /// Accept the next connection and complete its handshake in place.
    pub async fn accept(&self) -> Result<LabConnection> {
        let incoming = self.accept_incoming().await?;
        Self::handshake(incoming).await
    }

    /// Returns the local address this endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint
            .local_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))
    }

    /// Close the endpoint and every connection on it.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"shutdown");
    }

    /// Wait until all connections on the endpoint are drained.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}
