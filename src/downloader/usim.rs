//! Downloader for Unity Simulation run outputs.
//!
//! A `usim://` source URI names a run execution inside a project. The
//! workflow is: parse the URI, fetch the run's file manifest from the run
//! data service (authenticated), then batch-download the manifest's files
//! grouped by category.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::manifest::{ManifestDownloader, ManifestError};
use super::{DatasetDownloader, DownloadError, DownloadOptions};
use crate::config::UsimConfig;
use crate::fetch::{FetchError, HttpClient};
use crate::schema::TableRegistry;

/// Source-URI shape: `usim://<token>@<project-uuid>/<run-execution-id>`.
///
/// The token segment is optional (the `@` goes with it); the project id is
/// a UUID; the run execution id is a single word segment.
static SOURCE_URI_PATTERN: LazyLock<Regex> = LazyLock::new(source_uri_pattern);

#[allow(clippy::expect_used)]
fn source_uri_pattern() -> Regex {
    Regex::new(
        r"usim://([^@]*)?@?([a-fA-F0-9]{8}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{12})/(\w+)",
    )
    .expect("static source-uri pattern must compile")
}

/// Errors from the Unity Simulation download workflow.
#[derive(Debug, Error)]
pub enum UsimError {
    /// The source URI does not match the expected `usim://` shape.
    #[error(
        "invalid source-uri '{source_uri}', expected \
         usim://<token>@<project-id>/<run-execution-id>"
    )]
    InvalidSourceUri {
        /// The URI that failed to parse.
        source_uri: String,
    },

    /// No access token was supplied anywhere.
    #[error(
        "no access token for run execution '{run_execution_id}': supply one \
         via the source-uri, the --access-token flag, or the environment"
    )]
    MissingCredential {
        /// The run execution that could not be authenticated.
        run_execution_id: String,
    },

    /// The manifest could not be fetched from the run data service.
    #[error("failed to download manifest for run execution '{run_execution_id}': {source}")]
    ManifestDownload {
        /// The run execution whose manifest was requested.
        run_execution_id: String,
        /// The underlying fetch failure.
        #[source]
        source: FetchError,
    },

    /// The manifest was fetched but could not be parsed.
    #[error(transparent)]
    ManifestParse(#[from] ManifestError),
}

/// The pieces of a parsed `usim://` source URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSourceUri {
    /// Access token embedded in the URI, if any.
    pub access_token: Option<String>,
    /// Project UUID.
    pub project_id: String,
    /// Run execution id within the project.
    pub run_execution_id: String,
}

/// Parses a `usim://` source URI.
///
/// The URI must contain exactly one match of the pattern; zero or multiple
/// matches both mean the caller passed something malformed.
///
/// # Errors
///
/// Returns [`UsimError::InvalidSourceUri`] when the URI does not parse.
pub fn parse_source_uri(source_uri: &str) -> Result<ParsedSourceUri, UsimError> {
    let mut matches = SOURCE_URI_PATTERN.captures_iter(source_uri);
    let (Some(captures), None) = (matches.next(), matches.next()) else {
        return Err(UsimError::InvalidSourceUri {
            source_uri: source_uri.to_string(),
        });
    };

    let access_token = captures
        .get(1)
        .map(|m| m.as_str())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string);
    let project_id = captures[2].to_string();
    let run_execution_id = captures[3].to_string();

    Ok(ParsedSourceUri {
        access_token,
        project_id,
        run_execution_id,
    })
}

/// Downloads a Unity Simulation run's output via its file manifest.
#[derive(Debug, Clone)]
pub struct UnitySimulationDownloader {
    config: UsimConfig,
    client: HttpClient,
}

impl UnitySimulationDownloader {
    /// Creates a downloader against the configured run data service.
    #[must_use]
    pub fn new(config: UsimConfig) -> Self {
        Self {
            config,
            client: HttpClient::new(),
        }
    }

    /// Creates a downloader using the given fetch client.
    #[must_use]
    pub fn with_client(config: UsimConfig, client: HttpClient) -> Self {
        Self { config, client }
    }

    /// Resolves the access token for a parsed URI.
    ///
    /// Precedence: explicit override (CLI flag), then the token embedded in
    /// the URI, then the ambient config token. A token written into the URI
    /// is deliberate; an environment token must not shadow it.
    fn resolve_token<'a>(
        &'a self,
        parsed: &'a ParsedSourceUri,
        override_token: Option<&'a str>,
    ) -> Result<&'a str, UsimError> {
        override_token
            .or(parsed.access_token.as_deref())
            .or(self.config.access_token.as_deref())
            .ok_or_else(|| UsimError::MissingCredential {
                run_execution_id: parsed.run_execution_id.clone(),
            })
    }

    /// Ensures the run's manifest is on disk, fetching it if needed.
    ///
    /// The manifest is cached at `{output}/{run_execution_id}.csv`; an
    /// existing file is reused so interrupted downloads can resume without
    /// re-hitting the service.
    async fn ensure_manifest(
        &self,
        parsed: &ParsedSourceUri,
        output: &Path,
        token: &str,
    ) -> Result<PathBuf, UsimError> {
        let manifest_path = output.join(format!("{}.csv", parsed.run_execution_id));
        if manifest_path.exists() {
            info!(path = %manifest_path.display(), "reusing cached manifest");
            return Ok(manifest_path);
        }

        let manifest_url = format!(
            "{}/v1/projects/{}/runs/{}/data",
            self.config.api_endpoint, parsed.project_id, parsed.run_execution_id
        );
        debug!(%manifest_url, "fetching manifest");
        self.client
            .fetch_to_path(&manifest_url, &manifest_path, Some(token))
            .await
            .map_err(|e| UsimError::ManifestDownload {
                run_execution_id: parsed.run_execution_id.clone(),
                source: e,
            })?;
        Ok(manifest_path)
    }
}

#[async_trait]
impl DatasetDownloader for UnitySimulationDownloader {
    fn name(&self) -> &str {
        "usim"
    }

    /// Downloads reference, metric, and capture files for the run, plus
    /// binary files when requested.
    ///
    /// Per-file fetch failures inside the batch are logged and skipped;
    /// only URI parsing, authentication, and manifest acquisition abort the
    /// download.
    #[instrument(skip(self, options), fields(uri = %source_uri))]
    async fn download(
        &self,
        source_uri: &str,
        output: &Path,
        options: &DownloadOptions,
    ) -> Result<(), DownloadError> {
        let parsed = parse_source_uri(source_uri)?;
        let token = self.resolve_token(&parsed, options.access_token.as_deref())?;
        let manifest_path = self.ensure_manifest(&parsed, output, token).await?;

        let registry = TableRegistry::new();
        let downloader = ManifestDownloader::new(
            &manifest_path,
            output,
            self.client.clone(),
            &registry,
        )
        .map_err(UsimError::from)?;

        downloader.download_references().await;
        downloader.download_metrics().await;
        downloader.download_captures().await;
        if options.include_binary {
            downloader.download_binary_files().await;
        }

        Ok(())
    }
}
