//! Error types shared by the server and client cores.
//!
//! [`ProtoError`] covers setup concerns (credentials, TLS, configuration).
//! [`StreamError`] covers everything that can go wrong on a single stream or
//! while accepting/opening one, and knows how to tell an expected
//! end-of-connection apart from a real fault.

use thiserror::Error;

use crate::cancel::Interrupted;

/// Errors raised while preparing identities, TLS state or configuration.
#[derive(Debug, Error)]
pub enum ProtoError {
    // --- Identity ---
    #[error("failed to generate key pair: {0}")]
    KeyGeneration(String),

    #[error("failed to generate X.509 certificate: {0}")]
    CertificateGeneration(String),

    #[error("invalid certificate fingerprint: {0}")]
    InvalidFingerprint(String),

    // --- TLS ---
    #[error("TLS configuration error: {0}")]
    TlsConfiguration(String),

    // --- Configuration ---
    #[error("failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias using [`ProtoError`].
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Errors scoped to one stream (or to obtaining one from a connection).
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to open or accept stream: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("stream read failed: {0}")]
    Read(#[from] quinn::ReadError),

    #[error("stream write failed: {0}")]
    Write(#[from] quinn::WriteError),

    #[error("write side already closed")]
    WriteClosed,

    #[error("stream operation interrupted: {0}")]
    Interrupted(#[from] Interrupted),
}

impl StreamError {
    /// Returns true when the error means the connection ended normally
    /// (peer closed it, we closed it, or it idled out).
    ///
    /// Accept loops treat this as their exit signal and log it at low
    /// severity instead of reporting a failure.
    pub fn is_end_of_connection(&self) -> bool {
        let conn_err = match self {
            StreamError::Connection(e) => e,
            StreamError::Read(quinn::ReadError::ConnectionLost(e)) => e,
            StreamError::Write(quinn::WriteError::ConnectionLost(e)) => e,
            _ => return false,
        };
        matches!(
            conn_err,
            quinn::ConnectionError::ApplicationClosed(_)
                | quinn::ConnectionError::ConnectionClosed(_)
                | quinn::ConnectionError::LocallyClosed
                | quinn::ConnectionError::TimedOut
        )
    }

    /// Returns true when the operation was cancelled or hit its deadline.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, StreamError::Interrupted(_))
    }
}
