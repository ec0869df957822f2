//! TLS configuration for the QUIC endpoints.
//!
//! - Custom rustls verifier backed by a [`VerifyPolicy`](crate::trust::VerifyPolicy)
//! - TLS config builders (server and client)

pub mod config;
pub mod verifier;
