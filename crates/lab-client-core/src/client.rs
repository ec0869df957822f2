//! A client session: one endpoint, one connection, many streams.

use std::net::SocketAddr;

use lab_proto::cancel::CancelScope;
use lab_proto::config::LabConfig;
use lab_proto::transport::LabConnection;
use lab_proto::trust::VerifyPolicy;
use tracing::info;

use crate::driver::{DriverReport, greeting, local_now, run_concurrent, run_sequential};
use crate::endpoint::ClientEndpoint;
use crate::error::{ClientError, Result};
use crate::request::{Response, request};

/// Close code sent when the session ends normally.
pub const CLOSE_CODE_DONE: u32 = 0;

/// Close reason sent when the session ends normally.
pub const CLOSE_REASON_DONE: &[u8] = b"client done";

/// A connected echo client.
///
/// The handshake happens once in [`connect`](Self::connect); every exchange
/// afterwards opens a new stream on the same connection.
pub struct EchoClient {
    endpoint: ClientEndpoint,
    conn: LabConnection,
    config: LabConfig,
    scope: CancelScope,
}

impl EchoClient {
    /// Dial `config.server_addr`.
    pub async fn connect(config: LabConfig, policy: VerifyPolicy) -> Result<Self> {
        let addr = config.server_addr;
        Self::connect_to(addr, config, policy).await
    }

    /// Dial an explicit address.
    pub async fn connect_to(
        addr: SocketAddr,
        config: LabConfig,
        policy: VerifyPolicy,
    ) -> Result<Self> {
        let endpoint = ClientEndpoint::for_server(addr, policy, &config)?;
        let conn = endpoint.dial(addr).await?;
        Ok(Self {
            endpoint,
            conn,
            config,
            scope: CancelScope::unbounded(),
        })
    }

    pub fn connection(&self) -> &LabConnection {
        &self.conn
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    /// Cancels every exchange started by this client.
    pub fn cancel_scope(&self) -> &CancelScope {
        &self.scope
    }

    /// One exchange on a fresh stream.
    pub async fn send(&self, message: &[u8]) -> Result<Response> {
        let stream = self
            .conn
            .open_stream(&self.scope)
            .await
            .map_err(ClientError::OpenStream)?;
        Ok(request(stream, message, &self.config.stream_settings(), &self.scope).await?)
    }

    /// `count` timestamped greetings, one stream after another, pausing
    /// `config.stream_pause_ms` between them.
    pub async fn run_sequential(&self, count: usize) -> Result<DriverReport> {
        let messages = (1..=count).map(|i| greeting(i, local_now()).into_bytes());
        run_sequential(
            &self.conn,
            messages,
            self.config.stream_pause(),
            self.config.stream_settings(),
            &self.scope,
        )
        .await
    }

    /// Send each message on its own stream, all at once.
    pub async fn run_concurrent(&self, messages: Vec<Vec<u8>>) -> Result<DriverReport> {
        run_concurrent(&self.conn, messages, self.config.stream_settings(), &self.scope).await
    }

    /// Close the connection and wait for the close to reach the server.
    pub async fn finish(self) {
        self.scope.cancel();
        self.conn.close(CLOSE_CODE_DONE, CLOSE_REASON_DONE);
        self.endpoint.wait_idle().await;
        info!("client finished");
    }
}
