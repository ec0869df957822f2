//! Error types for the server transport layer.

use thiserror::Error;

/// Errors that can occur in the echo server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("endpoint bind failed: {0}")]
    Bind(String),

    #[error("endpoint closed")]
    EndpointClosed,

    #[error("incoming handshake failed: {0}")]
    Handshake(#[from] quinn::ConnectionError),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("server task failed: {0}")]
    Task(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] lab_proto::ProtoError),
}

impl ServerError {
    /// The accept loop cannot continue after this error.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerError::EndpointClosed | ServerError::Bind(_))
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
