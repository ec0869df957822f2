//! QUIC learning lab client-side core.
//!
//! - QUIC client endpoint (one handshake per session via quinn)
//! - Echo request: write, half-close, read until the server half-closes
//! - Sequential and concurrent stream drivers over a single connection

pub mod client;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod request;

pub use client::EchoClient;
pub use driver::{DriverReport, StreamReport, greeting, run_concurrent, run_sequential};
pub use endpoint::ClientEndpoint;
pub use error::ClientError;
pub use request::{Response, request};
