//! Error types for the client transport layer.

use thiserror::Error;

/// Errors that can occur in the echo client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("endpoint creation failed: {0}")]
    Endpoint(String),

    #[error("connection failed: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("connect error: {0}")]
    Connect(#[from] quinn::ConnectError),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("failed to open stream: {0}")]
    OpenStream(lab_proto::StreamError),

    #[error("stream error: {0}")]
    Stream(#[from] lab_proto::StreamError),

    #[error("stream task failed: {0}")]
    Task(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] lab_proto::ProtoError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
