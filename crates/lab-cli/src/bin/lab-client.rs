//! QUIC echo client.
//!
//! Dials the server once and sends timestamped greetings, each on its own
//! stream: one after another by default, all at once with `--concurrent`.

use clap::Parser;
use lab_cli::{CommonArgs, init_tracing};
use lab_client_core::driver::local_now;
use lab_client_core::{DriverReport, EchoClient, greeting};
use lab_proto::identity::Fingerprint;
use lab_proto::trust::VerifyPolicy;

#[derive(Parser)]
#[command(name = "lab-client")]
#[command(about = "QUIC multiplexed echo client", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of streams (one message each).
    #[arg(short = 'n', long, default_value_t = 3)]
    streams: usize,

    /// Open every stream at once instead of one after another.
    #[arg(long)]
    concurrent: bool,

    /// Pause between sequential streams in milliseconds (overrides `stream_pause_ms`).
    #[arg(long)]
    pause_ms: Option<u64>,

    /// Server certificate fingerprint (hex, as printed by lab-server).
    /// Without it the server certificate is not verified.
    #[arg(long)]
    pin: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("lab-client: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = cli.common.load_config()?;
    if let Some(ms) = cli.pause_ms {
        config.stream_pause_ms = ms;
    }

    let policy = match &cli.pin {
        Some(hex) => VerifyPolicy::pinned(Fingerprint::from_hex(hex)?),
        None => VerifyPolicy::SkipVerify,
    };

    let client = EchoClient::connect(config, policy).await?;

    let report = if cli.concurrent {
        let messages = (1..=cli.streams)
            .map(|i| greeting(i, local_now()).into_bytes())
            .collect();
        client.run_concurrent(messages).await
    } else {
        client.run_sequential(cli.streams).await
    };

    // Close the connection even when the run failed.
    client.finish().await;
    print_report(&report?);
    Ok(())
}

fn print_report(report: &DriverReport) {
    for stream in &report.streams {
        match &stream.outcome {
            Ok(response) => println!(
                "stream {} (id {}): {} [{} ms]",
                stream.index,
                stream.stream,
                response.text(),
                stream.elapsed.as_millis()
            ),
            Err(e) => println!("stream {} (id {}): failed: {e}", stream.index, stream.stream),
        }
    }
    println!(
        "{} completed, {} failed in {} ms",
        report.completed(),
        report.failed(),
        report.elapsed.as_millis()
    );
}
