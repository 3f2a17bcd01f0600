//! Protocol-prefix registry mapping source URIs to downloaders.
//!
//! The registry is an explicit table built at process start and passed to
//! whoever needs to resolve a source URI. Downloaders do not self-register;
//! that keeps construction order visible and avoids global mutable state.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::DatasetDownloader;
use super::http::HttpDownloader;
use super::usim::UnitySimulationDownloader;
use crate::config::UsimConfig;

/// Constructs a downloader instance for a registered protocol.
pub type DownloaderFactory = Box<dyn Fn() -> Arc<dyn DatasetDownloader> + Send + Sync>;

/// Error from source-URI resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No registered protocol prefix matches the source URI.
    #[error("no downloader registered for source-uri '{source_uri}'")]
    UnsupportedSource {
        /// The URI that could not be resolved.
        source_uri: String,
    },
}

/// Registry of downloader factories keyed by protocol prefix.
pub struct DownloaderRegistry {
    entries: Vec<(String, DownloaderFactory)>,
}

impl DownloaderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers a downloader factory for a protocol prefix (e.g. `usim://`).
    ///
    /// Registration order matters: it is the scan order for non-HTTP
    /// prefixes in [`resolve`](Self::resolve).
    pub fn register(&mut self, protocol: impl Into<String>, factory: DownloaderFactory) {
        self.entries.push((protocol.into(), factory));
    }

    /// Returns the registered protocol prefixes in registration order.
    #[must_use]
    pub fn protocols(&self) -> Vec<&str> {
        self.entries.iter().map(|(p, _)| p.as_str()).collect()
    }

    /// Resolves a source URI to a downloader instance.
    ///
    /// `http://` and `https://` URIs always select the downloader registered
    /// under `http://`, regardless of what other registered prefixes happen
    /// to occur inside the URI. Any other URI selects the first registered
    /// prefix that occurs anywhere in it.
    ///
    /// The substring scan (rather than a strict starts-with) mirrors the
    /// behavior downstream tools already rely on; a URI embedding an
    /// unrelated registered prefix elsewhere in its path resolves to that
    /// prefix. Keep registration order accordingly.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnsupportedSource`] when nothing matches.
    pub fn resolve(&self, source_uri: &str) -> Result<Arc<dyn DatasetDownloader>, ResolveError> {
        let matched = if source_uri.starts_with("http://") || source_uri.starts_with("https://") {
            self.entries.iter().find(|(protocol, _)| protocol == "http://")
        } else {
            self.entries
                .iter()
                .find(|(protocol, _)| source_uri.contains(protocol.as_str()))
        };

        match matched {
            Some((protocol, factory)) => {
                debug!(%protocol, %source_uri, "resolved downloader");
                Ok(factory())
            }
            None => Err(ResolveError::UnsupportedSource {
                source_uri: source_uri.to_string(),
            }),
        }
    }
}

impl Default for DownloaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DownloaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloaderRegistry")
            .field("protocols", &self.protocols())
            .finish()
    }
}

/// Builds the default registry: HTTP(S) archives and Unity Simulation runs.
///
/// Object-store schemes (e.g. `gs://`) are not shipped here; callers with a
/// blob client can register one themselves.
#[must_use]
pub fn default_registry(config: UsimConfig) -> DownloaderRegistry {
    let mut registry = DownloaderRegistry::new();
    registry.register(
        "http://",
        Box::new(|| Arc::new(HttpDownloader::new()) as Arc<dyn DatasetDownloader>),
    );
    registry.register(
        "usim://",
        Box::new(move || {
            Arc::new(UnitySimulationDownloader::new(config.clone())) as Arc<dyn DatasetDownloader>
        }),
    );
    registry
}
