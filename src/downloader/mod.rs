//! Dataset downloaders selected by source-URI protocol.
//!
//! # Architecture
//!
//! - [`DatasetDownloader`] - Async trait that concrete downloaders implement
//! - [`DownloaderRegistry`] - Explicit protocol-prefix table built at startup
//! - [`HttpDownloader`] - Plain HTTP(S) dataset archives, optional checksum
//! - [`UnitySimulationDownloader`] - Manifest-driven simulation-run output
//!
//! # Example
//!
//! ```no_run
//! use simdata_core::config::UsimConfig;
//! use simdata_core::downloader::{DownloadOptions, default_registry};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = default_registry(UsimConfig::from_env());
//! let downloader = registry.resolve("https://example.com/dataset.zip")?;
//! downloader
//!     .download(
//!         "https://example.com/dataset.zip",
//!         Path::new("./data"),
//!         &DownloadOptions::default(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod manifest;
mod registry;
pub mod usim;

pub use http::HttpDownloader;
pub use registry::{DownloaderRegistry, ResolveError, default_registry};
pub use usim::{UnitySimulationDownloader, UsimError};

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::fetch::{ChecksumError, FetchError};

/// Options for one download run.
#[derive(Debug, Default, Clone)]
pub struct DownloadOptions {
    /// Whether to download binary files such as images or LIDAR point
    /// clouds. Applies to datasets where metadata can be separated from
    /// binary files.
    pub include_binary: bool,
    /// Path or HTTP(S) URL of a text file holding the expected dataset
    /// checksum.
    pub checksum_file: Option<String>,
    /// Access token override. Takes precedence over any token embedded in
    /// the source URI.
    pub access_token: Option<String>,
}

/// Errors surfaced by a [`DatasetDownloader`].
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The file fetch failed after exhausting retries.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Checksum resolution or validation failed.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    /// The simulation-run manifest workflow failed.
    #[error(transparent)]
    Usim(#[from] UsimError),
}

/// A downloader for one source-URI protocol.
///
/// Implementations are selected by the [`DownloaderRegistry`] based on the
/// protocol prefix of the source URI.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Box<dyn DatasetDownloader>`. Rust 2024 native async traits are not
/// object-safe, so `async_trait` is required for the registry pattern.
#[async_trait]
pub trait DatasetDownloader: Send + Sync {
    /// Returns the downloader's name (e.g. "http", "usim").
    fn name(&self) -> &str;

    /// Downloads the dataset at `source_uri` into the `output` directory.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] when the dataset cannot be retrieved.
    /// Partial per-file failures inside a batch are not errors; see the
    /// concrete implementations.
    async fn download(
        &self,
        source_uri: &str,
        output: &Path,
        options: &DownloadOptions,
    ) -> Result<(), DownloadError>;
}
