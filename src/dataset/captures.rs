//! Accessor for capture tables and their annotations.

use std::path::Path;

use tracing::debug;

use super::matches_definition;
use crate::schema::{TableKind, TableRegistry};
use crate::table::{LoadOptions, Record, TableError, load_table};

/// All captures of a dataset, with annotations split out into their own
/// record set.
///
/// A capture is one sensor observation (e.g. a camera frame); its
/// annotations are the labels attached to it (bounding boxes, semantic
/// segmentation references, ...). The capture records here have their
/// `annotations` column dropped; each annotation record instead carries its
/// owning capture's id under `capture.id`.
#[derive(Debug)]
pub struct Captures {
    captures: Vec<Record>,
    annotations: Vec<Record>,
}

impl Captures {
    /// Loads every `captures_*.json` file under `data_root`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if a file cannot be read, fails to parse, or
    /// declares a schema version other than `version`.
    pub fn load(data_root: &Path, version: &str) -> Result<Self, TableError> {
        let registry = TableRegistry::new();
        let files = registry
            .find_table_files(data_root, TableKind::Captures)
            .map_err(|e| TableError::Io {
                path: data_root.to_path_buf(),
                source: e,
            })?;
        debug!(files = files.len(), "loading capture tables");

        let table_name = TableKind::Captures.table_name();
        let annotation_options = LoadOptions::flatten("annotations", &["id"], "capture.");

        let mut captures = Vec::new();
        let mut annotations = Vec::new();
        for file in &files {
            let mut rows = load_table(file, table_name, version, &LoadOptions::default())?;
            for row in &mut rows {
                row.remove("annotations");
            }
            captures.extend(rows);
            annotations.extend(load_table(file, table_name, version, &annotation_options)?);
        }

        Ok(Self {
            captures,
            annotations,
        })
    }

    /// The capture records, without their `annotations` column.
    #[must_use]
    pub fn captures(&self) -> &[Record] {
        &self.captures
    }

    /// All annotation records, each carrying its capture's id under
    /// `capture.id`.
    #[must_use]
    pub fn annotations(&self) -> &[Record] {
        &self.annotations
    }

    /// Returns the annotations produced by one annotation definition.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NoMatchingRecords`] when no annotation
    /// references `def_id`.
    pub fn filter(&self, def_id: &str) -> Result<Vec<Record>, TableError> {
        let matched: Vec<Record> = self
            .annotations
            .iter()
            .filter(|r| matches_definition(r, "annotation_definition", def_id))
            .cloned()
            .collect();

        if matched.is_empty() {
            return Err(TableError::NoMatchingRecords {
                def_id: def_id.to_string(),
                table_name: TableKind::Captures.table_name().to_string(),
            });
        }
        Ok(matched)
    }
}
