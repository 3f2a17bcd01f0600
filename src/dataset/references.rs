//! Accessors for the static reference tables of a dataset.
//!
//! Reference tables are written once per simulation: annotation and metric
//! definitions plus the ego and sensor inventories. Definition ids are
//! unique within a dataset; duplicates mean the dataset is corrupt and
//! loading fails.

use std::path::Path;

use tracing::debug;

use super::matches_definition;
use crate::schema::{TableKind, TableRegistry};
use crate::table::{LoadOptions, Record, TableError, check_duplicate_records, load_table};

/// Loads one reference table kind from every matching file under the root,
/// enforcing id uniqueness across the merged records.
fn load_reference(
    data_root: &Path,
    kind: TableKind,
    version: &str,
) -> Result<Vec<Record>, TableError> {
    let registry = TableRegistry::new();
    let files = registry
        .find_table_files(data_root, kind)
        .map_err(|e| TableError::Io {
            path: data_root.to_path_buf(),
            source: e,
        })?;
    debug!(table = %kind, files = files.len(), "loading reference table");

    let mut records = Vec::new();
    for file in &files {
        records.extend(load_table(
            file,
            kind.table_name(),
            version,
            &LoadOptions::default(),
        )?);
    }
    check_duplicate_records(&records, "id", kind.table_name())?;
    Ok(records)
}

/// Finds the record whose `id` equals `def_id`.
fn get_by_id(records: &[Record], def_id: &str, kind: TableKind) -> Result<Record, TableError> {
    records
        .iter()
        .find(|r| matches_definition(r, "id", def_id))
        .cloned()
        .ok_or_else(|| TableError::NoMatchingRecords {
            def_id: def_id.to_string(),
            table_name: kind.table_name().to_string(),
        })
}

macro_rules! reference_table {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name {
            records: Vec<Record>,
        }

        impl $name {
            /// Loads the table from `data_root`, validating the schema
            /// version and id uniqueness.
            ///
            /// # Errors
            ///
            /// Returns [`TableError`] on read/parse failure, version
            /// mismatch, or a duplicated id.
            pub fn load(data_root: &Path, version: &str) -> Result<Self, TableError> {
                Ok(Self {
                    records: load_reference(data_root, $kind, version)?,
                })
            }

            /// The loaded records.
            #[must_use]
            pub fn records(&self) -> &[Record] {
                &self.records
            }

            /// Returns the record with the given id.
            ///
            /// # Errors
            ///
            /// Returns [`TableError::NoMatchingRecords`] when the id is
            /// absent.
            pub fn get_definition(&self, def_id: &str) -> Result<Record, TableError> {
                get_by_id(&self.records, def_id, $kind)
            }
        }
    };
}

reference_table!(
    /// The annotation definitions of a dataset: one record per kind of label
    /// the simulation produced (bounding boxes, segmentation, ...).
    AnnotationDefinitions,
    TableKind::AnnotationDefinitions
);

reference_table!(
    /// The metric definitions of a dataset: one record per kind of metric
    /// emitted during the simulation.
    MetricDefinitions,
    TableKind::MetricDefinitions
);

reference_table!(
    /// The egos of a dataset: the entities sensors are attached to.
    Egos,
    TableKind::Egos
);

reference_table!(
    /// The sensor inventory of a dataset.
    Sensors,
    TableKind::Sensors
);
