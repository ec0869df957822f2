//! Connection wrapper shared by server and client.
//!
//! [`LabConnection`] is a cheap, cloneable handle over one `quinn::Connection`.
//! It tracks which streams derived from it are still alive and whether a
//! close has been requested, and it hands out [`LabStream`]s.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::cancel::CancelScope;
use crate::error::StreamError;
use crate::transport::stream::{LabStream, StreamId};

/// Liveness of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Active,
    /// We asked to close; the transport has not torn it down yet.
    Closing,
    Closed,
}

type OpenSet = Arc<Mutex<BTreeSet<StreamId>>>;

/// Keeps a stream id in its connection's open set while the stream lives.
pub(crate) struct Registration {
    id: StreamId,
    open: OpenSet,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.open
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

/// A secured QUIC connection.
#[derive(Clone)]
pub struct LabConnection {
    inner: quinn::Connection,
    open: OpenSet,
    closing: Arc<AtomicBool>,
}

impl LabConnection {
    pub fn new(conn: quinn::Connection) -> Self {
        Self {
            inner: conn,
            open: Arc::new(Mutex::new(BTreeSet::new())),
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Transport-assigned id, stable for the connection's lifetime. Two
    /// handles with the same id refer to the same session.
    pub fn id(&self) -> usize {
        self.inner.stable_id()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.remote_address()
    }

    /// The ALPN protocol both sides agreed on.
    pub fn alpn(&self) -> Option<String> {
        self.inner
            .handshake_data()?
            .downcast::<quinn::crypto::rustls::HandshakeData>()
            .ok()?
            .protocol
            .map(|p| String::from_utf8_lossy(&p).into_owned())
    }

    pub fn state(&self) -> ConnectionState {
        if self.inner.close_reason().is_some() {
            ConnectionState::Closed
        } else if self.closing.load(Ordering::Acquire) {
            ConnectionState::Closing
        } else {
            ConnectionState::Active
        }
    }

    /// Ids of streams from this connection whose [`LabStream`] is still alive.
    pub fn open_streams(&self) -> Vec<StreamId> {
        self.open
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    /// Open a new bidirectional stream to the peer.
    ///
    /// The peer only learns about the stream once data (or a FIN) is sent.
    pub async fn open_stream(&self, scope: &CancelScope) -> Result<LabStream, StreamError> {
        let (send, recv) = scope.run(self.inner.open_bi()).await??;
        let stream = self.register(send, recv);
        debug!(conn = self.id(), stream = %stream.id(), "opened stream");
        Ok(stream)
    }

    /// Wait for the peer to open a bidirectional stream.
    ///
    /// When the connection ends this fails with an error for which
    /// [`StreamError::is_end_of_connection`] is true.
    pub async fn accept_stream(&self, scope: &CancelScope) -> Result<LabStream, StreamError> {
        let (send, recv) = scope.run(self.inner.accept_bi()).await??;
        let stream = self.register(send, recv);
        debug!(conn = self.id(), stream = %stream.id(), "accepted stream");
        Ok(stream)
    }

    fn register(&self, send: quinn::SendStream, recv: quinn::RecvStream) -> LabStream {
        let id = StreamId::from(send.id());
        self.open
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id);
        let registration = Registration {
            id,
            open: Arc::clone(&self.open),
        };
        LabStream::new(send, recv, registration)
    }

    /// Close the connection. Every stream derived from it becomes invalid.
    pub fn close(&self, code: u32, reason: &[u8]) {
        self.closing.store(true, Ordering::Release);
        self.inner.close(quinn::VarInt::from_u32(code), reason);
        debug!(conn = self.id(), code, "connection close requested");
    }

    /// Resolves once the connection is gone, with the reason.
    pub async fn closed(&self) -> quinn::ConnectionError {
        self.inner.closed().await
    }
}

impl std::fmt::Debug for LabConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabConnection")
            .field("id", &self.id())
            .field("remote", &self.remote_addr())
            .field("state", &self.state())
            .finish()
    }
}
