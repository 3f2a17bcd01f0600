//! Table schema registry for synthetic dataset files.
//!
//! A simulation run produces JSON table files (captures, metrics, reference
//! definitions) alongside binary artifacts (images, LIDAR point clouds). This
//! module knows the filename pattern of every table kind and classifies
//! arbitrary filenames into a [`FileCategory`] so that callers can download
//! or load only the subset they care about.
//!
//! The registry is built once at startup and injected where needed; there is
//! no global mutable table.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Synthetic dataset schema version understood by this crate.
pub const SCHEMA_VERSION: &str = "0.0.1";

/// Category assigned to a dataset file based on its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    /// Static definition tables written once per simulation
    /// (annotation_definitions, metric_definitions, egos, sensors).
    Reference,
    /// Metric record files (`metrics_*.json`).
    Metric,
    /// Capture record files (`captures_*.json`).
    Capture,
    /// Everything else: images, point clouds, and other opaque artifacts.
    Binary,
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reference => "reference",
            Self::Metric => "metric",
            Self::Capture => "capture",
            Self::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// Logical name of a known dataset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// `annotation_definitions.json`
    AnnotationDefinitions,
    /// `captures_*.json`
    Captures,
    /// `egos.json`
    Egos,
    /// `metric_definitions.json`
    MetricDefinitions,
    /// `metrics_*.json`
    Metrics,
    /// `sensors.json`
    Sensors,
}

impl TableKind {
    /// All table kinds in registry (classification) order.
    ///
    /// Classification tests descriptors in this order and the first match
    /// wins, so the order must stay deterministic.
    pub const ALL: [TableKind; 6] = [
        TableKind::AnnotationDefinitions,
        TableKind::Captures,
        TableKind::Egos,
        TableKind::MetricDefinitions,
        TableKind::Metrics,
        TableKind::Sensors,
    ];

    /// The top-level JSON key under which this table's records are stored.
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            Self::AnnotationDefinitions => "annotation_definitions",
            Self::Captures => "captures",
            Self::Egos => "egos",
            Self::MetricDefinitions => "metric_definitions",
            Self::Metrics => "metrics",
            Self::Sensors => "sensors",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Immutable description of one known table kind.
///
/// Constructed once by [`TableRegistry::new`] and never mutated.
#[derive(Debug)]
pub struct TableDescriptor {
    /// The logical table this descriptor identifies.
    pub kind: TableKind,
    /// Unix-style glob locating table files under a dataset root.
    pub glob_pattern: &'static str,
    /// Compiled filename pattern used for classification.
    pub match_regex: Regex,
    /// Category assigned to files matching this descriptor.
    pub category: FileCategory,
}

/// Registry of every known table descriptor, in fixed order.
///
/// # Example
///
/// ```
/// use simdata_core::schema::{FileCategory, TableRegistry};
///
/// let registry = TableRegistry::new();
/// assert_eq!(registry.classify("captures_000.json"), FileCategory::Capture);
/// assert_eq!(registry.classify("RGB3/rgb_42.png"), FileCategory::Binary);
/// ```
#[derive(Debug)]
pub struct TableRegistry {
    descriptors: Vec<TableDescriptor>,
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRegistry {
    /// Builds the registry of all known tables.
    ///
    /// # Panics
    ///
    /// Panics if a static pattern fails to compile. This should never happen
    /// in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let entry = |kind, glob_pattern, pattern: &str, category| TableDescriptor {
            kind,
            glob_pattern,
            match_regex: Regex::new(pattern).expect("static table pattern must compile"),
            category,
        };

        // A table file may be nested under a relative directory, hence the
        // leading `(?:\w|-|/)*` in every pattern.
        let descriptors = vec![
            entry(
                TableKind::AnnotationDefinitions,
                "**/annotation_definitions.json",
                r"^(?:\w|-|/)*annotation_definitions\.json",
                FileCategory::Reference,
            ),
            entry(
                TableKind::Captures,
                "**/captures_*.json",
                r"^(?:\w|-|/)*captures_[0-9]+\.json",
                FileCategory::Capture,
            ),
            entry(
                TableKind::Egos,
                "**/egos.json",
                r"^(?:\w|-|/)*egos\.json",
                FileCategory::Reference,
            ),
            entry(
                TableKind::MetricDefinitions,
                "**/metric_definitions.json",
                r"^(?:\w|-|/)*metric_definitions\.json",
                FileCategory::Reference,
            ),
            entry(
                TableKind::Metrics,
                "**/metrics_*.json",
                r"^(?:\w|-|/)*metrics_[0-9]+\.json",
                FileCategory::Metric,
            ),
            entry(
                TableKind::Sensors,
                "**/sensors.json",
                r"^(?:\w|-|/)*sensors\.json",
                FileCategory::Reference,
            ),
        ];

        Self { descriptors }
    }

    /// Returns the descriptor for a table kind.
    #[must_use]
    pub fn descriptor(&self, kind: TableKind) -> &TableDescriptor {
        // ALL and descriptors share the same order; the position lookup
        // cannot fail for a valid TableKind.
        &self.descriptors[TableKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default()]
    }

    /// Classifies a filename into a [`FileCategory`].
    ///
    /// Descriptors are tested in registry order against the given name; the
    /// first match wins. Names matching no descriptor are [`FileCategory::Binary`].
    /// This is a total function over all strings: there is no failure mode.
    #[must_use]
    pub fn classify(&self, filename: &str) -> FileCategory {
        for descriptor in &self.descriptors {
            if descriptor.match_regex.is_match(filename) {
                return descriptor.category;
            }
        }
        FileCategory::Binary
    }

    /// Finds all files of a table kind under a dataset root.
    ///
    /// Walks `data_root` recursively and returns paths whose root-relative
    /// name matches the table's filename pattern. Results are sorted for
    /// deterministic load order.
    ///
    /// # Errors
    ///
    /// Returns an IO error if a directory cannot be read.
    pub fn find_table_files(
        &self,
        data_root: &Path,
        kind: TableKind,
    ) -> Result<Vec<PathBuf>, io::Error> {
        let descriptor = self.descriptor(kind);
        let mut matches = Vec::new();
        let mut pending = vec![data_root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            for dir_entry in std::fs::read_dir(&dir)? {
                let path = dir_entry?.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(data_root) {
                    let name = relative.to_string_lossy().replace('\\', "/");
                    if descriptor.match_regex.is_match(&name) {
                        matches.push(path);
                    }
                }
            }
        }

        matches.sort();
        Ok(matches)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_reference_files() {
        let registry = TableRegistry::new();
        assert_eq!(
            registry.classify("annotation_definitions.json"),
            FileCategory::Reference
        );
        assert_eq!(registry.classify("egos.json"), FileCategory::Reference);
        assert_eq!(
            registry.classify("metric_definitions.json"),
            FileCategory::Reference
        );
        assert_eq!(registry.classify("sensors.json"), FileCategory::Reference);
    }

    #[test]
    fn test_classify_capture_files() {
        let registry = TableRegistry::new();
        assert_eq!(
            registry.classify("captures_000.json"),
            FileCategory::Capture
        );
        assert_eq!(
            registry.classify("captures_999999.json"),
            FileCategory::Capture
        );
    }

    #[test]
    fn test_classify_metric_files() {
        let registry = TableRegistry::new();
        assert_eq!(registry.classify("metrics_000.json"), FileCategory::Metric);
    }

    #[test]
    fn test_classify_with_relative_path_prefix() {
        let registry = TableRegistry::new();
        assert_eq!(
            registry.classify("Dataset-abc/captures_012.json"),
            FileCategory::Capture
        );
        assert_eq!(
            registry.classify("some/nested/dir/egos.json"),
            FileCategory::Reference
        );
    }

    #[test]
    fn test_classify_unmatched_is_binary() {
        let registry = TableRegistry::new();
        assert_eq!(registry.classify("RGB3/rgb_42.png"), FileCategory::Binary);
        assert_eq!(registry.classify("lidar_007.pcd"), FileCategory::Binary);
        assert_eq!(registry.classify(""), FileCategory::Binary);
        // Suffix must include the numeric index to count as a capture table.
        assert_eq!(registry.classify("captures.json"), FileCategory::Binary);
    }

    #[test]
    fn test_classification_order_is_deterministic() {
        let registry = TableRegistry::new();
        let kinds: Vec<TableKind> = registry.descriptors.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, TableKind::ALL);
    }

    #[test]
    fn test_descriptor_lookup_matches_kind() {
        let registry = TableRegistry::new();
        for kind in TableKind::ALL {
            assert_eq!(registry.descriptor(kind).kind, kind);
        }
    }

    #[test]
    fn test_table_name() {
        assert_eq!(TableKind::Captures.table_name(), "captures");
        assert_eq!(
            TableKind::AnnotationDefinitions.table_name(),
            "annotation_definitions"
        );
    }

    #[test]
    fn test_find_table_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Dataset-x");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("captures_000.json"), "{}").unwrap();
        std::fs::write(nested.join("captures_001.json"), "{}").unwrap();
        std::fs::write(nested.join("egos.json"), "{}").unwrap();
        std::fs::write(dir.path().join("rgb_1.png"), "").unwrap();

        let registry = TableRegistry::new();
        let captures = registry
            .find_table_files(dir.path(), TableKind::Captures)
            .unwrap();
        assert_eq!(captures.len(), 2);
        assert!(captures[0].ends_with("captures_000.json"));

        let egos = registry
            .find_table_files(dir.path(), TableKind::Egos)
            .unwrap();
        assert_eq!(egos.len(), 1);
    }
}
