//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download synthetic datasets from HTTP archives or Unity Simulation runs.
///
/// The source-uri protocol selects the downloader: plain `http(s)://` URLs
/// fetch a single dataset artifact, `usim://` URIs fetch a simulation run's
/// output via its file manifest.
#[derive(Parser, Debug)]
#[command(name = "simdata")]
#[command(author, version, about)]
pub struct Args {
    /// URI of the dataset source, e.g.
    /// usim://<token>@<project-id>/<run-execution-id> or
    /// https://example.com/dataset.zip
    #[arg(short = 's', long = "source-uri")]
    pub source_uri: String,

    /// Directory the dataset is downloaded into (defaults to
    /// SIMDATA_DATA_ROOT, then ./data)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Also download binary files such as images and LIDAR point clouds
    #[arg(short = 'b', long)]
    pub include_binary: bool,

    /// Unity Simulation access token; overrides any token embedded in the
    /// source-uri
    #[arg(long)]
    pub access_token: Option<String>,

    /// Path or URL of a text file holding the dataset's expected checksum
    /// (HTTP sources only)
    #[arg(long)]
    pub checksum_file: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
