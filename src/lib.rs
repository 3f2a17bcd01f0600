//! Simdata Core Library
//!
//! This library provides the core functionality for the simdata tool, which
//! downloads synthetic computer-vision datasets — from plain HTTP archives
//! or straight from Unity Simulation run executions — and gives typed access
//! to the dataset's tables.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`schema`] - Table filename patterns and file classification
//! - [`table`] - Versioned JSON table loading and validation
//! - [`fetch`] - Single-file HTTP fetching with retries and checksums
//! - [`downloader`] - Protocol-keyed downloaders (HTTP, Unity Simulation)
//! - [`dataset`] - Accessors over the downloaded capture/metric/reference tables
//! - [`config`] - Environment-driven configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dataset;
pub mod downloader;
pub mod fetch;
pub mod schema;
pub mod table;

// Re-export commonly used types
pub use config::UsimConfig;
pub use dataset::{AnnotationDefinitions, Captures, Egos, MetricDefinitions, Metrics, Sensors};
pub use downloader::{
    DatasetDownloader, DownloadError, DownloadOptions, DownloaderRegistry, HttpDownloader,
    ResolveError, UnitySimulationDownloader, UsimError, default_registry,
};
pub use fetch::{
    Algorithm, ChecksumError, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, FetchError, HttpClient,
    RetryPolicy,
};
pub use schema::{FileCategory, SCHEMA_VERSION, TableKind, TableRegistry};
pub use table::{LoadOptions, Record, TableError, load_table};
