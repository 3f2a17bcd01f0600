//! Checksum computation and validation for downloaded artifacts.
//!
//! Deletion-on-mismatch is deliberate: a corrupt artifact must never be left
//! on disk looking like a valid one.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::Crc;
use thiserror::Error;
use tracing::{debug, info};

use super::HttpClient;
use super::error::FetchError;

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// CRC32, expressed as a decimal integer.
    Crc32,
    /// MD5, expressed as a lowercase hex digest.
    Md5,
}

impl Algorithm {
    /// Infers the algorithm from the textual form of an expected checksum:
    /// a plain integer is CRC32, a hex digest is MD5.
    #[must_use]
    pub fn infer(expected: &str) -> Self {
        if expected.chars().all(|c| c.is_ascii_digit()) {
            Self::Crc32
        } else {
            Self::Md5
        }
    }
}

/// Errors raised while computing or validating checksums.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// The computed checksum differs from the expected value.
    ///
    /// The offending file has already been deleted when this is returned by
    /// [`validate_checksum`].
    #[error("checksum mismatch for {path}: expected {expected}, computed {computed}")]
    Mismatch {
        /// The file that failed validation.
        path: PathBuf,
        /// The expected checksum value.
        expected: String,
        /// The checksum actually computed.
        computed: String,
    },

    /// The file could not be read for checksumming.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// The unreadable file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A remote checksum file could not be fetched.
    #[error("failed to fetch checksum file {location}: {source}")]
    Fetch {
        /// The checksum file URL.
        location: String,
        /// The underlying fetch error.
        #[source]
        source: FetchError,
    },

    /// The checksum file location is neither a local file nor an HTTP(S) URL.
    #[error("cannot read checksum from {location}")]
    UnreadableChecksum {
        /// The location that was rejected.
        location: String,
    },
}

/// Computes the checksum of a file.
///
/// CRC32 values are rendered as decimal integers, MD5 digests as lowercase
/// hex, matching the textual form found in checksum files.
///
/// # Errors
///
/// Returns [`ChecksumError::Io`] if the file cannot be read.
pub fn compute_checksum(path: &Path, algorithm: Algorithm) -> Result<String, ChecksumError> {
    let io_err = |e| ChecksumError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut buffer = [0u8; 8192];

    match algorithm {
        Algorithm::Crc32 => {
            let mut crc = Crc::new();
            loop {
                let read = file.read(&mut buffer).map_err(io_err)?;
                if read == 0 {
                    break;
                }
                crc.update(&buffer[..read]);
            }
            Ok(crc.sum().to_string())
        }
        Algorithm::Md5 => {
            let mut context = md5::Context::new();
            loop {
                let read = file.read(&mut buffer).map_err(io_err)?;
                if read == 0 {
                    break;
                }
                context.consume(&buffer[..read]);
            }
            Ok(format!("{:x}", context.compute()))
        }
    }
}

/// Checks whether a file's checksum matches the expected value.
///
/// # Errors
///
/// Returns [`ChecksumError::Io`] if the file cannot be read. A mismatch is
/// not an error here; use [`validate_checksum`] for strict validation.
pub fn checksum_matches(
    path: &Path,
    expected: &str,
    algorithm: Algorithm,
) -> Result<bool, ChecksumError> {
    let computed = compute_checksum(path, algorithm)?;
    Ok(computed.eq_ignore_ascii_case(expected.trim()))
}

/// Validates a file's checksum, deleting the file on mismatch.
///
/// # Errors
///
/// Returns [`ChecksumError::Mismatch`] after deleting the file, or
/// [`ChecksumError::Io`] if it cannot be read.
pub fn validate_checksum(
    path: &Path,
    expected: &str,
    algorithm: Algorithm,
) -> Result<(), ChecksumError> {
    let computed = compute_checksum(path, algorithm)?;
    if computed.eq_ignore_ascii_case(expected.trim()) {
        debug!(path = %path.display(), "checksum validated");
        return Ok(());
    }

    info!(path = %path.display(), "checksum mismatch, deleting the downloaded file");
    let _ = std::fs::remove_file(path);
    Err(ChecksumError::Mismatch {
        path: path.to_path_buf(),
        expected: expected.trim().to_string(),
        computed,
    })
}

/// Reads the expected checksum from a checksum file.
///
/// `location` may be a local path or an HTTP(S) URL; remote files are
/// fetched into a temporary directory first. The file is expected to hold a
/// single checksum value as plain text.
///
/// # Errors
///
/// Returns [`ChecksumError::Fetch`] if a remote file cannot be fetched,
/// [`ChecksumError::Io`] if a local file cannot be read, or
/// [`ChecksumError::UnreadableChecksum`] for any other location.
pub async fn checksum_from_file(
    location: &str,
    client: &HttpClient,
) -> Result<String, ChecksumError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let tmp = tempfile::tempdir().map_err(|e| ChecksumError::Io {
            path: PathBuf::from(location),
            source: e,
        })?;
        let path = client
            .fetch(location, tmp.path(), Some("checksum.txt"))
            .await
            .map_err(|e| ChecksumError::Fetch {
                location: location.to_string(),
                source: e,
            })?;
        read_checksum_text(&path)
    } else if Path::new(location).is_file() {
        read_checksum_text(Path::new(location))
    } else {
        Err(ChecksumError::UnreadableChecksum {
            location: location.to_string(),
        })
    }
}

fn read_checksum_text(path: &Path) -> Result<String, ChecksumError> {
    let content = std::fs::read_to_string(path).map_err(|e| ChecksumError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(content.trim().to_string())
}
