//! Runtime configuration shared by the server and client.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields the stock setup: loopback port 4242, ALPN `quic-learning-lab`,
//! 1 KiB read buffers.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::echo::{DEFAULT_ALPN, DEFAULT_BUFFER_SIZE, DEFAULT_PREFIX};
use crate::error::{ProtoError, Result};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LabConfig {
    /// Address the server binds and the client dials.
    pub server_addr: SocketAddr,

    /// TLS server name the client presents (must match a certificate SAN
    /// under a verifying policy).
    pub server_name: String,

    /// ALPN protocol identifier; must match on both sides.
    pub alpn: String,

    /// Fixed read buffer size. Longer messages are truncated.
    pub buffer_size: usize,

    /// Marker the server prepends to echoed messages.
    pub echo_prefix: String,

    /// Deadline for each individual stream read or write.
    pub io_timeout_ms: u64,

    /// Connection idle timeout negotiated with the peer.
    pub idle_timeout_ms: u64,

    /// Bidirectional streams the peer may have open at once.
    pub max_concurrent_streams: u32,

    /// Client pause between streams in sequential mode.
    pub stream_pause_ms: u64,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 4242)),
            server_name: "localhost".to_string(),
            alpn: DEFAULT_ALPN.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            echo_prefix: DEFAULT_PREFIX.to_string(),
            io_timeout_ms: 5_000,
            idle_timeout_ms: 30_000,
            max_concurrent_streams: 100,
            stream_pause_ms: 1_000,
        }
    }
}

impl LabConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: LabConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject values no endpoint can run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(ProtoError::InvalidConfig("buffer_size must be > 0".into()));
        }
        if self.alpn.is_empty() {
            return Err(ProtoError::InvalidConfig("alpn must not be empty".into()));
        }
        if self.server_name.is_empty() {
            return Err(ProtoError::InvalidConfig("server_name must not be empty".into()));
        }
        if self.max_concurrent_streams == 0 {
            return Err(ProtoError::InvalidConfig(
                "max_concurrent_streams must be > 0".into(),
            ));
        }
        if self.io_timeout_ms == 0 || self.idle_timeout_ms == 0 {
            return Err(ProtoError::InvalidConfig("timeouts must be > 0".into()));
        }
        Ok(())
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn stream_pause(&self) -> Duration {
        Duration::from_millis(self.stream_pause_ms)
    }

    /// Per-stream knobs, copied into every stream task.
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            buffer_size: self.buffer_size,
            io_timeout: self.io_timeout(),
        }
    }

    /// QUIC transport parameters derived from this config.
    pub fn transport_config(&self) -> Result<Arc<quinn::TransportConfig>> {
        let idle = quinn::IdleTimeout::try_from(self.idle_timeout())
            .map_err(|e| ProtoError::InvalidConfig(format!("idle_timeout_ms: {e}")))?;
        let mut transport = quinn::TransportConfig::default();
        transport
            .max_idle_timeout(Some(idle))
            .max_concurrent_bidi_streams(quinn::VarInt::from_u32(self.max_concurrent_streams));
        Ok(Arc::new(transport))
    }
}

/// Limits applied to each stream exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub buffer_size: usize,
    pub io_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        LabConfig::default().stream_settings()
    }
}
