//! HTTP client wrapper for fetching files with bounded retries.
//!
//! The retry policy is applied beneath the fetch call: callers see only the
//! final success or the final failure after all attempts are exhausted.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::FetchError;
use super::filename::{filename_from_url, parse_content_disposition};
use super::retry::{RetryDecision, RetryPolicy, classify_error};

/// Connect/read timeout applied to every fetch attempt, in seconds.
///
/// Simulation artifacts can be large and the object store can be slow to
/// start streaming, hence the generous bound. The timeout applies per
/// attempt, never to a whole batch.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;

/// HTTP client for fetching files with streaming writes and automatic retry.
///
/// Designed to be created once and reused across a whole batch, taking
/// advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use simdata_core::fetch::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let path = client
///     .fetch("https://example.com/captures_000.json", Path::new("./data"), None)
///     .await?;
/// println!("Fetched: {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_policy: RetryPolicy,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with the default timeout (1800 s) and retry policy
    /// (5 attempts).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_TIMEOUT_SECS, RetryPolicy::default())
    }

    /// Creates a client with explicit timeout and retry configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_config(timeout_secs: u64, retry_policy: RetryPolicy) -> Self {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(timeout_secs))
            .read_timeout(std::time::Duration::from_secs(timeout_secs))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            retry_policy,
        }
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Fetches a file into a directory.
    ///
    /// The destination filename is, in order of precedence: the explicit
    /// `file_name` parameter, the response's Content-Disposition header, the
    /// final path segment of the URL. Parent directories are created as
    /// needed and the body is streamed to disk.
    ///
    /// Transient failures are retried with backoff beneath this call.
    ///
    /// # Errors
    ///
    /// Returns the final [`FetchError`] once the retry policy is exhausted
    /// or the failure is permanent.
    #[must_use = "fetch result contains the path to the downloaded file"]
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        dest_dir: &Path,
        file_name: Option<&str>,
    ) -> Result<PathBuf, FetchError> {
        self.fetch_with_retry(url, Target::Directory {
            dest_dir,
            file_name,
        })
        .await
    }

    /// Fetches a URL to an exact destination path, optionally sending a
    /// bearer token.
    ///
    /// Used for authenticated manifest acquisition where the local path is
    /// fixed in advance. Same timeout and retry behavior as [`fetch`](Self::fetch).
    ///
    /// # Errors
    ///
    /// Returns the final [`FetchError`] once the retry policy is exhausted
    /// or the failure is permanent.
    #[instrument(skip(self, bearer_token), fields(url = %url, path = %dest_path.display()))]
    pub async fn fetch_to_path(
        &self,
        url: &str,
        dest_path: &Path,
        bearer_token: Option<&str>,
    ) -> Result<PathBuf, FetchError> {
        self.fetch_with_retry(url, Target::ExactPath {
            dest_path,
            bearer_token,
        })
        .await
    }

    /// Retry loop shared by both fetch entry points.
    async fn fetch_with_retry(
        &self,
        url: &str,
        target: Target<'_>,
    ) -> Result<PathBuf, FetchError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting fetch");

            match self.fetch_once(url, target).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    let failure_type = classify_error(&e);
                    match self.retry_policy.should_retry(failure_type, attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next_attempt,
                        } => {
                            warn!(
                                url = %url,
                                attempt = next_attempt,
                                max_attempts = self.retry_policy.max_attempts(),
                                delay_ms = delay.as_millis(),
                                error = %e,
                                "retrying fetch"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(url = %url, %reason, "not retrying fetch");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Performs a single fetch attempt.
    async fn fetch_once(&self, url: &str, target: Target<'_>) -> Result<PathBuf, FetchError> {
        let parsed_url = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let mut request = self.client.get(parsed_url.clone());
        if let Target::ExactPath {
            bearer_token: Some(token),
            ..
        } = target
        {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let dest_path = match target {
            Target::Directory {
                dest_dir,
                file_name,
            } => {
                let name = match file_name {
                    Some(name) => name.to_string(),
                    None => response
                        .headers()
                        .get(CONTENT_DISPOSITION)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_content_disposition)
                        .unwrap_or_else(|| filename_from_url(&parsed_url)),
                };
                dest_dir.join(name)
            }
            Target::ExactPath { dest_path, .. } => dest_path.to_path_buf(),
        };

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }

        let file = File::create(&dest_path)
            .await
            .map_err(|e| FetchError::io(dest_path.clone(), e))?;
        let mut writer = BufWriter::new(file);

        let mut stream = response.bytes_stream();
        let mut bytes_written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // Never leave a half-written artifact behind.
                    let _ = tokio::fs::remove_file(&dest_path).await;
                    return Err(FetchError::network(url, e));
                }
            };
            if let Err(e) = writer.write_all(&chunk).await {
                let _ = tokio::fs::remove_file(&dest_path).await;
                return Err(FetchError::io(dest_path.clone(), e));
            }
            bytes_written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| FetchError::io(dest_path.clone(), e))?;

        info!(path = %dest_path.display(), bytes = bytes_written, "fetch complete");
        Ok(dest_path)
    }
}

/// Where a fetched body lands on disk.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    /// Into a directory, with the filename derived if not given.
    Directory {
        dest_dir: &'a Path,
        file_name: Option<&'a str>,
    },
    /// To an exact path, optionally with a bearer token on the request.
    ExactPath {
        dest_path: &'a Path,
        bearer_token: Option<&'a str>,
    },
}
