//! QUIC learning lab shared protocol layer.
//!
//! Used by both `lab-server-core` and `lab-client-core`:
//!
//! - Credential provider (Ed25519 key, self-signed certificate, fingerprint)
//! - Pluggable server verification policy and rustls configuration
//! - Connection and stream handles with half-close tracking over quinn
//! - Echo protocol constants and the [`Responder`](echo::Responder) seam
//! - Cancellation scopes and runtime configuration

pub mod cancel;
pub mod config;
pub mod echo;
pub mod error;
pub mod identity;
pub mod tls;
pub mod transport;
pub mod trust;

pub use cancel::{CancelScope, Interrupted};
pub use config::{LabConfig, StreamSettings};
pub use echo::{EchoTransform, Responder};
pub use error::{ProtoError, StreamError};
pub use identity::{Credentials, Fingerprint};
pub use transport::{LabConnection, LabStream};
pub use trust::VerifyPolicy;
