//! Supervised accept loop.
//!
//! [`EchoServer`] owns the endpoint and runs one task per connection. The
//! loop stops when its [`CancelScope`] is cancelled (explicit shutdown) or
//! when the endpoint closes underneath it; a failed handshake from a single
//! peer is logged and the loop keeps going.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lab_proto::cancel::CancelScope;
use lab_proto::config::{LabConfig, StreamSettings};
use lab_proto::echo::Responder;
use lab_proto::identity::Credentials;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::dispatcher::dispatch;
use crate::endpoint::ServerEndpoint;
use crate::error::{Result, ServerError};
use crate::stats::{ServerStats, StatsSnapshot};

/// Upper bound on waiting for connections to drain after close.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// An echo server bound to a local address.
pub struct EchoServer<R: Responder> {
    endpoint: ServerEndpoint,
    responder: Arc<R>,
    settings: StreamSettings,
    stats: Arc<ServerStats>,
}

impl<R: Responder> EchoServer<R> {
    /// Bind to `config.server_addr` with `credentials`.
    pub fn bind(config: &LabConfig, credentials: &Credentials, responder: R) -> Result<Self> {
        Self::bind_to(config.server_addr, config, credentials, responder)
    }

    /// Bind to an explicit address, e.g. `127.0.0.1:0` in tests.
    pub fn bind_to(
        addr: SocketAddr,
        config: &LabConfig,
        credentials: &Credentials,
        responder: R,
    ) -> Result<Self> {
        config.validate()?;
        let endpoint = ServerEndpoint::bind(addr, credentials, config)?;
        Ok(Self {
            endpoint,
            responder: Arc::new(responder),
            settings: config.stream_settings(),
            stats: Arc::new(ServerStats::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Accept connections until `shutdown` is cancelled or the endpoint closes.
    ///
    /// Returns `Ok(())` after a requested shutdown and
    /// `Err(ServerError::EndpointClosed)` if the endpoint went away on its own.
    pub async fn run(self, shutdown: CancelScope) -> Result<()> {
        info!("waiting for connections");

        let outcome = loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested");
                    break Ok(());
                }
                accepted = self.endpoint.accept_incoming() => accepted,
            };

            let incoming = match accepted {
                Ok(incoming) => incoming,
                Err(e) if e.is_terminal() => {
                    warn!(error = %e, "accept loop stopping");
                    break Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let span = info_span!("conn", peer = %incoming.remote_address());
            tokio::spawn(
                serve_connection(
                    incoming,
                    Arc::clone(&self.responder),
                    self.settings,
                    shutdown.child(),
                    Arc::clone(&self.stats),
                )
                .instrument(span),
            );
        };

        self.endpoint.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, self.endpoint.wait_idle())
            .await
            .is_err()
        {
            debug!("connections still draining at shutdown");
        }
        info!("server stopped");
        outcome
    }

    /// Run the accept loop on its own task.
    pub fn spawn(self) -> Result<ServerHandle> {
        let local_addr = self.local_addr()?;
        let stats = self.stats();
        let shutdown = CancelScope::unbounded();
        let task = tokio::spawn(self.run(shutdown.clone()));
        Ok(ServerHandle {
            local_addr,
            shutdown,
            stats,
            task,
        })
    }
}

/// Handshake and serve one connection. Runs on its own task, so a peer that
/// stalls or fails its handshake never delays anyone else.
async fn serve_connection<R: Responder>(
    incoming: quinn::Incoming,
    responder: Arc<R>,
    settings: StreamSettings,
    scope: CancelScope,
    stats: Arc<ServerStats>,
) {
    let conn = match scope.run(ServerEndpoint::handshake(incoming)).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            warn!(error = %e, "handshake failed");
            return;
        }
        Err(interrupted) => {
            debug!(%interrupted, "handshake abandoned");
            return;
        }
    };

    stats.connection_accepted();
    info!(conn = conn.id(), peer = %conn.remote_addr(), "new connection");

    let end = dispatch(conn, responder, settings, scope, stats).await;
    debug!(?end, "dispatcher finished");
}

/// Control handle for a spawned [`EchoServer`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancelScope,
    stats: Arc<ServerStats>,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns true once the accept loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the accept loop, every dispatcher and every in-flight stream,
    /// then wait for the loop to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| ServerError::Task(e.to_string()))?
    }
}
