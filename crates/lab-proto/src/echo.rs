//! The echo protocol.
//!
//! One request and one response per stream, no length prefix. The initiator
//! writes its message and half-closes; the responder reads until that
//! half-close (or until its fixed buffer is full), writes back the
//! transformed bytes and half-closes in turn.
//!
//! What the responder sends back is pluggable through [`Responder`]; the
//! stock implementation is [`EchoTransform`], which prepends a prefix.

use std::future::Future;

/// ALPN protocol identifier negotiated during the handshake.
pub const DEFAULT_ALPN: &str = "quic-learning-lab";

/// Marker prepended to every echoed message.
pub const DEFAULT_PREFIX: &str = "Echo: ";

/// Size of the fixed read buffer on both sides.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Produces the response for one complete request.
///
/// Implementations run inside the per-stream task, so a slow responder only
/// ever delays its own stream.
pub trait Responder: Send + Sync + 'static {
    fn respond(&self, request: Vec<u8>) -> impl Future<Output = Vec<u8>> + Send;
}

/// `transform(m) = prefix ++ m`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoTransform {
    prefix: Vec<u8>,
}

impl EchoTransform {
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn apply(&self, message: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + message.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(message);
        out
    }
}

impl Default for EchoTransform {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl Responder for EchoTransform {
    async fn respond(&self, request: Vec<u8>) -> Vec<u8> {
        self.apply(&request)
    }
}
