//! Single-file fetching with timeouts, bounded retries, and checksum
//! validation.
//!
//! # Features
//!
//! - Streaming fetches (memory-efficient for large artifacts)
//! - Automatic filename derivation from Content-Disposition headers
//! - Per-attempt timeout (1800 s) with transparent retry (5 attempts)
//! - CRC32/MD5 checksum validation with deletion on mismatch
//!
//! # Example
//!
//! ```no_run
//! use simdata_core::fetch::HttpClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let path = client
//!     .fetch("https://example.com/egos.json", Path::new("./data"), None)
//!     .await?;
//! println!("Fetched: {}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod checksum;
mod client;
mod error;
mod filename;
mod retry;

pub use checksum::{
    Algorithm, ChecksumError, checksum_from_file, checksum_matches, compute_checksum,
    validate_checksum,
};
pub use client::{DEFAULT_TIMEOUT_SECS, HttpClient};
pub use error::FetchError;
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
