//! QUIC echo server.
//!
//! Generates fresh credentials, prints the certificate fingerprint for
//! clients that want to pin it, and echoes every stream until Ctrl-C.

use clap::Parser;
use lab_cli::{CommonArgs, init_tracing};
use lab_proto::cancel::CancelScope;
use lab_proto::echo::EchoTransform;
use lab_proto::identity::Credentials;
use lab_server_core::EchoServer;

#[derive(Parser)]
#[command(name = "lab-server")]
#[command(about = "QUIC multiplexed echo server", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Marker prepended to echoed messages (overrides `echo_prefix`).
    #[arg(long)]
    prefix: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("lab-server: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = cli.common.load_config()?;
    if let Some(prefix) = cli.prefix {
        config.echo_prefix = prefix;
    }

    let credentials = Credentials::generate()?;
    println!("certificate fingerprint: {}", credentials.fingerprint());

    let responder = EchoTransform::new(config.echo_prefix.clone());
    let server = EchoServer::bind(&config, &credentials, responder)?;
    tracing::info!(
        address = %server.local_addr()?,
        alpn = %config.alpn,
        buffer_size = config.buffer_size,
        "Listening for connections"
    );

    let shutdown = CancelScope::unbounded();
    let stats = server.stats();
    let mut serve = tokio::spawn(server.run(shutdown.clone()));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
            serve.await??;
        }
        // The accept loop only ends by itself on a terminal endpoint error.
        finished = &mut serve => finished??,
    }
    let totals = stats.snapshot();
    tracing::info!(
        connections = totals.connections_accepted,
        streams = totals.streams_completed,
        failed = totals.streams_failed,
        "Shutdown complete"
    );
    Ok(())
}
