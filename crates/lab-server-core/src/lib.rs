//! QUIC learning lab server-side core.
//!
//! - QUIC server endpoint (binds with the process credentials via quinn)
//! - Supervised accept loop with an explicit shutdown path
//! - Per-connection stream dispatcher, one task per stream
//! - Echo handler: read until half-close, respond, half-close

pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod server;
pub mod stats;

pub use dispatcher::{DispatchEnd, dispatch};
pub use endpoint::ServerEndpoint;
pub use error::ServerError;
pub use handler::{Exchange, handle};
pub use server::{EchoServer, ServerHandle};
pub use stats::{ServerStats, StatsSnapshot};
