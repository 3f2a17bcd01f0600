//! Downloader for datasets published at plain HTTP(S) URLs.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{DatasetDownloader, DownloadError, DownloadOptions};
use crate::fetch::{Algorithm, HttpClient, checksum_from_file, validate_checksum};

/// Downloads a dataset from any public HTTP or HTTPS URL, optionally
/// validating it against a checksum file.
///
/// A checksum mismatch deletes the downloaded file before the error is
/// surfaced: a checksum-validated download must never leave a corrupt
/// artifact on disk under the destination name.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    client: HttpClient,
}

impl HttpDownloader {
    /// Creates a downloader with the default fetch client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: HttpClient::new(),
        }
    }

    /// Creates a downloader using the given fetch client.
    #[must_use]
    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DatasetDownloader for HttpDownloader {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, options), fields(uri = %source_uri))]
    async fn download(
        &self,
        source_uri: &str,
        output: &Path,
        options: &DownloadOptions,
    ) -> Result<(), DownloadError> {
        let dataset_path = self.client.fetch(source_uri, output, None).await?;

        if let Some(checksum_file) = &options.checksum_file {
            debug!(checksum_file, "reading checksum from checksum file");
            let expected = checksum_from_file(checksum_file, &self.client).await?;
            let algorithm = Algorithm::infer(&expected);
            debug!(?algorithm, "validating checksum");
            // Deletes the artifact on mismatch before erroring.
            validate_checksum(&dataset_path, &expected, algorithm)?;
        }

        Ok(())
    }
}
