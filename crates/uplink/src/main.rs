//! Uplink CLI binary.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use uplink::cli::Cli;

/// Main entry point for the uplink CLI.
///
/// Rows go to stdout, so logs are sent to stderr.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Example: RUST_LOG=uplink=debug,uplink_jsonl=trace uplink trace ...
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("uplink=info,uplink_jsonl=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("Starting uplink CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Uplink CLI completed successfully");
    Ok(())
}
