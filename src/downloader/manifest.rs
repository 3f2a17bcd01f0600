//! Simulation-run manifest parsing and concurrent batch download.
//!
//! The manifest is a CSV listing every file a simulation run produced, with
//! instance/attempt identifiers and a download URI per row. A worker may
//! retry a unit of work after a failure, so the manifest can hold several
//! attempts per instance; only the highest-numbered attempt's output is
//! authoritative and earlier attempts are filtered out before anything is
//! downloaded.
//!
//! Batch downloads run on a bounded worker pool. A single file's failure
//! never aborts the batch: each task's outcome is collected as a tagged
//! value, failures are logged, and the caller gets the successful paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::fetch::HttpClient;
use crate::schema::{FileCategory, TableRegistry};

/// Errors raised while reading or parsing a manifest file.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("IO error reading manifest {path}: {source}")]
    Io {
        /// Path of the manifest file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A manifest row does not have the expected shape.
    #[error("malformed manifest at line {line}: {reason}")]
    Malformed {
        /// 1-indexed line number of the offending row.
        line: usize,
        /// What was wrong with the row.
        reason: String,
    },
}

/// One row of a simulation-run manifest.
///
/// Columns appear in the fixed order
/// `(run_execution_id, app_param_id, instance_id, attempt_id, file_name,
/// download_uri)`; `category` is derived from `file_name` at parse time, not
/// stored in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    /// Run execution this file belongs to.
    pub run_execution_id: String,
    /// App-param set the producing instance ran with.
    pub app_param_id: String,
    /// Simulation work-unit instance that produced the file.
    pub instance_id: String,
    /// Which attempt of the instance produced the file. Higher attempt ids
    /// supersede lower ones for the same instance.
    pub attempt_id: i64,
    /// Output filename, possibly with a relative directory prefix.
    pub file_name: String,
    /// Where the file can be fetched from.
    pub download_uri: String,
    /// Category derived by matching `file_name` against the table registry.
    pub category: FileCategory,
}

/// Result of one download job inside a batch.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The file landed on disk.
    Success {
        /// Local path of the downloaded file.
        local_path: PathBuf,
    },
    /// The fetch failed after exhausting retries.
    Failure {
        /// The URI that could not be fetched.
        uri: String,
        /// Final error rendered for logging.
        reason: String,
    },
}

/// Loads a manifest file: parse, drop superseded attempts, classify rows.
///
/// # Errors
///
/// Returns [`ManifestError`] if the file cannot be read or a row is
/// malformed.
pub fn load_manifest(
    path: &Path,
    registry: &TableRegistry,
) -> Result<Vec<ManifestRow>, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rows = parse_manifest(&content, registry)?;
    Ok(filter_superseded_attempts(rows))
}

/// Parses manifest CSV content into rows.
///
/// The manifest is headerless with six fixed columns, but a leading header
/// line (recognizable by its non-numeric `attempt_id`) is tolerated and
/// skipped, since the run data service emits one. The `download_uri` column
/// is the line remainder, so signed URLs containing commas survive intact.
///
/// # Errors
///
/// Returns [`ManifestError::Malformed`] for rows with the wrong column
/// count or a non-integer `attempt_id`.
pub fn parse_manifest(
    content: &str,
    registry: &TableRegistry,
) -> Result<Vec<ManifestRow>, ManifestError> {
    let mut rows = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.splitn(6, ',').collect();
        if fields.len() != 6 {
            return Err(ManifestError::Malformed {
                line: index + 1,
                reason: format!("expected 6 columns, found {}", fields.len()),
            });
        }

        let attempt_id = match fields[3].trim().parse::<i64>() {
            Ok(value) => value,
            Err(_) if index == 0 => continue, // header row
            Err(_) => {
                return Err(ManifestError::Malformed {
                    line: index + 1,
                    reason: format!("attempt_id '{}' is not an integer", fields[3].trim()),
                });
            }
        };

        let file_name = fields[4].trim().to_string();
        let category = registry.classify(&file_name);
        rows.push(ManifestRow {
            run_execution_id: fields[0].trim().to_string(),
            app_param_id: fields[1].trim().to_string(),
            instance_id: fields[2].trim().to_string(),
            attempt_id,
            file_name,
            download_uri: fields[5].trim().to_string(),
            category,
        });
    }

    Ok(rows)
}

/// Removes rows superseded by a later attempt of the same instance.
///
/// After filtering, exactly one attempt id survives per `instance_id`: the
/// maximum one. This keeps output from failed runs out of the dataset. The
/// reduction drops rows, it never mutates them; relative order of survivors
/// is preserved.
#[must_use]
pub fn filter_superseded_attempts(rows: Vec<ManifestRow>) -> Vec<ManifestRow> {
    let mut last_attempt: HashMap<&str, i64> = HashMap::new();
    for row in &rows {
        last_attempt
            .entry(row.instance_id.as_str())
            .and_modify(|max| *max = (*max).max(row.attempt_id))
            .or_insert(row.attempt_id);
    }

    let keep: Vec<bool> = rows
        .iter()
        .map(|row| last_attempt.get(row.instance_id.as_str()) == Some(&row.attempt_id))
        .collect();

    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}

/// Upper bound on concurrent fetch tasks.
///
/// `min(32, available_parallelism + 4)` — a common pool-sizing heuristic for
/// IO-bound work, not a hard requirement.
#[must_use]
pub fn default_max_workers() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    (parallelism + 4).min(32)
}

/// Downloads the files listed in a parsed simulation-run manifest.
///
/// Owns the row sequence for the duration of the batch; the only cross-call
/// state is the manifest file itself, which the caller manages.
#[derive(Debug)]
pub struct ManifestDownloader {
    rows: Vec<ManifestRow>,
    data_root: PathBuf,
    client: HttpClient,
    max_workers: usize,
}

impl ManifestDownloader {
    /// Loads a manifest file and prepares a batch downloader rooted at
    /// `data_root`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if the manifest cannot be read or parsed.
    pub fn new(
        manifest_path: &Path,
        data_root: impl Into<PathBuf>,
        client: HttpClient,
        registry: &TableRegistry,
    ) -> Result<Self, ManifestError> {
        let rows = load_manifest(manifest_path, registry)?;
        Ok(Self {
            rows,
            data_root: data_root.into(),
            client,
            max_workers: default_max_workers(),
        })
    }

    /// Overrides the worker-pool bound (minimum 1).
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// The deduplicated, classified manifest rows.
    #[must_use]
    pub fn rows(&self) -> &[ManifestRow] {
        &self.rows
    }

    /// Downloads every file in the manifest.
    pub async fn download_all(&self) -> Vec<PathBuf> {
        let downloaded = self.download_rows(|_| true).await;
        info!(
            downloaded = downloaded.len(),
            "all manifest files downloaded"
        );
        downloaded
    }

    /// Downloads all reference files.
    ///
    /// Reference tables are static during the simulation; they come from the
    /// definition of the simulation rather than from individual instances.
    pub async fn download_references(&self) -> Vec<PathBuf> {
        info!("downloading reference files");
        let downloaded = self
            .download_rows(|row| row.category == FileCategory::Reference)
            .await;
        info!(downloaded = downloaded.len(), "reference files downloaded");
        downloaded
    }

    /// Downloads all metric files.
    pub async fn download_metrics(&self) -> Vec<PathBuf> {
        info!("downloading metric files");
        let downloaded = self
            .download_rows(|row| row.category == FileCategory::Metric)
            .await;
        info!(downloaded = downloaded.len(), "metric files downloaded");
        downloaded
    }

    /// Downloads all capture files.
    pub async fn download_captures(&self) -> Vec<PathBuf> {
        info!("downloading capture files");
        let downloaded = self
            .download_rows(|row| row.category == FileCategory::Capture)
            .await;
        info!(downloaded = downloaded.len(), "capture files downloaded");
        downloaded
    }

    /// Downloads all binary files (images, point clouds, ...).
    pub async fn download_binary_files(&self) -> Vec<PathBuf> {
        info!("downloading binary files");
        let downloaded = self
            .download_rows(|row| row.category == FileCategory::Binary)
            .await;
        info!(downloaded = downloaded.len(), "binary files downloaded");
        downloaded
    }

    /// Downloads the rows selected by `matches` on a bounded worker pool.
    ///
    /// A manifest can list millions of files; one transfer failure must not
    /// hold back the rest of the data. Fetch errors are caught at the task
    /// boundary, logged, and excluded from the returned paths. A shortfall
    /// against the expected count is a logged warning, not an error.
    /// Ordering of the returned paths is not guaranteed.
    #[instrument(skip(self, matches))]
    async fn download_rows(&self, matches: impl Fn(&ManifestRow) -> bool) -> Vec<PathBuf> {
        let selected: Vec<ManifestRow> = self
            .rows
            .iter()
            .filter(|row| matches(row))
            .cloned()
            .collect();
        let n_expected = selected.len();
        debug!(n_expected, "submitting fetch tasks");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let progress = ProgressBar::new(n_expected as u64);
        let mut handles = Vec::with_capacity(n_expected);

        for row in selected {
            let semaphore = Arc::clone(&semaphore);
            let client = self.client.clone();
            let data_root = self.data_root.clone();
            let progress = progress.clone();

            // Once started, a task runs to completion; there is no
            // cancellation and the batch blocks until every task is done.
            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return DownloadOutcome::Failure {
                            uri: row.download_uri,
                            reason: "worker pool closed".to_string(),
                        };
                    }
                };
                let outcome = fetch_row(&client, &data_root, &row).await;
                progress.inc(1);
                outcome
            }));
        }

        let mut downloaded = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(DownloadOutcome::Success { local_path }) => downloaded.push(local_path),
                Ok(DownloadOutcome::Failure { uri, reason }) => {
                    error!(%uri, %reason, "file download failed");
                }
                Err(e) => warn!(error = %e, "fetch task panicked"),
            }
        }
        progress.finish_and_clear();

        if downloaded.len() != n_expected {
            warn!(
                expected = n_expected,
                downloaded = downloaded.len(),
                "found {} matching records in the manifest, but only {} were downloaded",
                n_expected,
                downloaded.len()
            );
        }

        downloaded
    }
}

/// Fetches one manifest row, preserving its relative path under `data_root`.
async fn fetch_row(client: &HttpClient, data_root: &Path, row: &ManifestRow) -> DownloadOutcome {
    let relative = Path::new(&row.file_name);
    let dest_dir = match relative.parent() {
        Some(parent) if parent != Path::new("") => data_root.join(parent),
        _ => data_root.to_path_buf(),
    };
    let file_name = relative
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| row.file_name.clone());

    match client
        .fetch(&row.download_uri, &dest_dir, Some(&file_name))
        .await
    {
        Ok(local_path) => DownloadOutcome::Success { local_path },
        Err(e) => DownloadOutcome::Failure {
            uri: row.download_uri.clone(),
            reason: e.to_string(),
        },
    }
}
