//! CLI entry point for the dataset download tool.

use anyhow::Result;
use clap::Parser;
use simdata_core::config::{UsimConfig, default_data_root};
use simdata_core::downloader::{DownloadOptions, default_registry};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let output = args.output.unwrap_or_else(default_data_root);
    let config = UsimConfig::from_env();

    let options = DownloadOptions {
        include_binary: args.include_binary,
        checksum_file: args.checksum_file,
        access_token: args.access_token,
    };

    let registry = default_registry(config);
    let downloader = registry.resolve(&args.source_uri)?;
    info!(
        downloader = downloader.name(),
        output = %output.display(),
        "starting dataset download"
    );

    downloader
        .download(&args.source_uri, &output, &options)
        .await?;

    info!(output = %output.display(), "dataset download complete");
    Ok(())
}
