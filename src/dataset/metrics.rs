//! Accessor for metric tables.

use std::path::Path;

use tracing::debug;

use super::matches_definition;
use crate::schema::{TableKind, TableRegistry};
use crate::table::{LoadOptions, Record, TableError, load_table};

/// Metric event fields hoisted onto each flattened value row.
const METRIC_META: [&str; 5] = [
    "capture_id",
    "annotation_id",
    "sequence_id",
    "step",
    "metric_definition",
];

/// All metric values of a dataset, one record per emitted value.
///
/// A metric event carries a `values` array; loading flattens it so each
/// value becomes its own record with the event's identifying fields
/// (`capture_id`, `annotation_id`, `sequence_id`, `step`,
/// `metric_definition`) carried alongside.
#[derive(Debug)]
pub struct Metrics {
    metrics: Vec<Record>,
}

impl Metrics {
    /// Loads every `metrics_*.json` file under `data_root`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if a file cannot be read, fails to parse, or
    /// declares a schema version other than `version`.
    pub fn load(data_root: &Path, version: &str) -> Result<Self, TableError> {
        let registry = TableRegistry::new();
        let files = registry
            .find_table_files(data_root, TableKind::Metrics)
            .map_err(|e| TableError::Io {
                path: data_root.to_path_buf(),
                source: e,
            })?;
        debug!(files = files.len(), "loading metric tables");

        let options = LoadOptions::flatten("values", &METRIC_META, "");
        let table_name = TableKind::Metrics.table_name();

        let mut metrics = Vec::new();
        for file in &files {
            metrics.extend(load_table(file, table_name, version, &options)?);
        }
        Ok(Self { metrics })
    }

    /// The flattened metric value records.
    #[must_use]
    pub fn metrics(&self) -> &[Record] {
        &self.metrics
    }

    /// Returns the metric values emitted by one metric definition.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NoMatchingRecords`] when no value references
    /// `def_id`.
    pub fn filter_metrics(&self, def_id: &str) -> Result<Vec<Record>, TableError> {
        let matched: Vec<Record> = self
            .metrics
            .iter()
            .filter(|r| matches_definition(r, "metric_definition", def_id))
            .cloned()
            .collect();

        if matched.is_empty() {
            return Err(TableError::NoMatchingRecords {
                def_id: def_id.to_string(),
                table_name: TableKind::Metrics.table_name().to_string(),
            });
        }
        Ok(matched)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_metrics(dir: &tempfile::TempDir) {
        std::fs::write(
            dir.path().join("metrics_000.json"),
            serde_json::to_string(&json!({
                "version": "0.0.1",
                "metrics": [
                    {
                        "capture_id": "cap-1",
                        "annotation_id": null,
                        "sequence_id": "seq-1",
                        "step": 0,
                        "metric_definition": "def-count",
                        "values": [
                            {"label": "car", "count": 3},
                            {"label": "person", "count": 1},
                        ],
                    },
                    {
                        "capture_id": "cap-2",
                        "annotation_id": null,
                        "sequence_id": "seq-1",
                        "step": 1,
                        "metric_definition": "def-light",
                        "values": [{"intensity": 0.8}],
                    },
                ],
            }))
            .unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_load_flattens_values_with_event_fields() {
        let dir = tempfile::tempdir().unwrap();
        write_metrics(&dir);

        let metrics = Metrics::load(dir.path(), "0.0.1").unwrap();
        assert_eq!(metrics.metrics().len(), 3);

        let first = &metrics.metrics()[0];
        assert_eq!(first.get("label").unwrap(), "car");
        assert_eq!(first.get("capture_id").unwrap(), "cap-1");
        assert_eq!(first.get("metric_definition").unwrap(), "def-count");
    }

    #[test]
    fn test_filter_metrics_by_definition() {
        let dir = tempfile::tempdir().unwrap();
        write_metrics(&dir);

        let metrics = Metrics::load(dir.path(), "0.0.1").unwrap();
        assert_eq!(metrics.filter_metrics("def-count").unwrap().len(), 2);
        assert_eq!(metrics.filter_metrics("def-light").unwrap().len(), 1);
        assert!(matches!(
            metrics.filter_metrics("def-nope"),
            Err(TableError::NoMatchingRecords { .. })
        ));
    }
}
