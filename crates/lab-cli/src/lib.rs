//! Shared plumbing for the `lab-server` and `lab-client` binaries.
//!
//! - Tracing subscriber setup (`RUST_LOG`, default `info`)
//! - Config loading: optional TOML file, then command-line overrides

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;
use lab_proto::config::LabConfig;
use lab_proto::error::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Options shared by both binaries.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// TOML configuration file. Missing fields take their defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server address (overrides `server_addr`).
    #[arg(short, long)]
    pub addr: Option<SocketAddr>,

    /// ALPN protocol identifier (overrides `alpn`).
    #[arg(long)]
    pub alpn: Option<String>,

    /// Read buffer size in bytes (overrides `buffer_size`).
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Per-read/write deadline in milliseconds (overrides `io_timeout_ms`).
    #[arg(long)]
    pub io_timeout_ms: Option<u64>,
}

impl CommonArgs {
    /// Load the config file (or defaults) and apply overrides.
    pub fn load_config(&self) -> Result<LabConfig> {
        let mut config = match &self.config {
            Some(path) => LabConfig::load(path)?,
            None => LabConfig::default(),
        };
        if let Some(addr) = self.addr {
            config.server_addr = addr;
        }
        if let Some(alpn) = &self.alpn {
            config.alpn = alpn.clone();
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = size;
        }
        if let Some(ms) = self.io_timeout_ms {
            config.io_timeout_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}
