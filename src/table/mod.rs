//! Versioned JSON table loading and validation.
//!
//! Every dataset table file carries a top-level `version` string and a
//! top-level array of records under a table-specific key. [`load_table`]
//! parses the file, verifies the embedded version against the expected
//! schema version, and extracts the records. Downstream record shapes are
//! version-coupled, so a version mismatch is a hard failure, never a
//! warning.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// One loaded table record: an ordered mapping of field name to value.
pub type Record = Map<String, Value>;

/// Errors raised while loading or validating a table file.
#[derive(Debug, Error)]
pub enum TableError {
    /// The file could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path of the file being read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not well-formed JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path of the malformed file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The embedded schema version differs from the expected version.
    #[error("version mismatch in {path}: expected {expected}, found {found}")]
    VersionMismatch {
        /// Path of the offending file.
        path: PathBuf,
        /// The version the caller requested.
        expected: String,
        /// The version declared by the file, or `(missing)`.
        found: String,
    },

    /// The named table array is absent from the file.
    #[error("table '{table_name}' not found in {path}")]
    MissingTable {
        /// Path of the file missing the table.
        path: PathBuf,
        /// The table key that was requested.
        table_name: String,
    },

    /// A column expected to be unique holds duplicate values.
    #[error(
        "duplicate record found in column '{column}' of table '{table_name}'; \
         this column is expected to be unique"
    )]
    DuplicateRecord {
        /// The column holding duplicates.
        column: String,
        /// The table being checked.
        table_name: String,
    },

    /// A filter by definition id matched zero records.
    #[error("no records match definition id '{def_id}' in table '{table_name}'")]
    NoMatchingRecords {
        /// The definition id used for filtering.
        def_id: String,
        /// The table that was filtered.
        table_name: String,
    },
}

/// Options controlling record extraction in [`load_table`].
#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    /// Flatten the array found under this key inside each record, one output
    /// row per nested element.
    pub record_path: Option<String>,
    /// Parent fields to hoist onto each flattened row.
    pub meta: Vec<String>,
    /// Prefix applied to hoisted parent field names (e.g. `capture.`).
    pub meta_prefix: Option<String>,
    /// Treat an absent table key as an empty result instead of an error.
    pub allow_missing: bool,
}

impl LoadOptions {
    /// Options that flatten `record_path` and hoist the given parent fields
    /// under `prefix`.
    #[must_use]
    pub fn flatten(
        record_path: impl Into<String>,
        meta: &[&str],
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            record_path: Some(record_path.into()),
            meta: meta.iter().map(|m| (*m).to_string()).collect(),
            meta_prefix: Some(prefix.into()),
            allow_missing: false,
        }
    }
}

/// Loads records from a versioned JSON table file.
///
/// The file must declare a top-level `version` equal to `expected_version`
/// and hold an array of records under `table_name`. With
/// [`LoadOptions::record_path`] set, each record's nested array is flattened
/// into one row per element, with selected parent fields hoisted under
/// [`LoadOptions::meta_prefix`] — used e.g. to join each annotation row to
/// its owning capture's id.
///
/// # Errors
///
/// - [`TableError::Io`] / [`TableError::Parse`] if the file cannot be read
///   or is malformed JSON.
/// - [`TableError::VersionMismatch`] if the embedded version differs. This
///   is checked before any records are returned.
/// - [`TableError::MissingTable`] if `table_name` is absent and
///   `allow_missing` is not set.
pub fn load_table(
    path: &Path,
    table_name: &str,
    expected_version: &str,
    options: &LoadOptions,
) -> Result<Vec<Record>, TableError> {
    debug!(table = table_name, path = %path.display(), "loading table");

    let file = File::open(path).map_err(|e| TableError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let data: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| TableError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

    verify_version(&data, expected_version, path)?;

    let Some(rows) = data.get(table_name).and_then(Value::as_array) else {
        if options.allow_missing {
            return Ok(Vec::new());
        }
        return Err(TableError::MissingTable {
            path: path.to_path_buf(),
            table_name: table_name.to_string(),
        });
    };

    let records = match &options.record_path {
        None => rows.iter().map(as_record).collect(),
        Some(record_path) => flatten_records(rows, record_path, options),
    };

    Ok(records)
}

/// Verifies the embedded schema version of a parsed table file.
///
/// # Errors
///
/// Returns [`TableError::VersionMismatch`] if the `version` field is absent
/// or differs from `expected`.
pub fn verify_version(data: &Value, expected: &str, path: &Path) -> Result<(), TableError> {
    let found = data.get("version").and_then(Value::as_str);
    match found {
        Some(version) if version == expected => Ok(()),
        _ => Err(TableError::VersionMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            found: found.unwrap_or("(missing)").to_string(),
        }),
    }
}

/// Checks that a column holds no duplicate values across records.
///
/// Records without the column are ignored. Values are compared by their JSON
/// representation.
///
/// # Errors
///
/// Returns [`TableError::DuplicateRecord`] on the first duplicate found.
pub fn check_duplicate_records(
    records: &[Record],
    column: &str,
    table_name: &str,
) -> Result<(), TableError> {
    let mut seen = std::collections::HashSet::new();
    for record in records {
        if let Some(value) = record.get(column)
            && !seen.insert(value.to_string())
        {
            return Err(TableError::DuplicateRecord {
                column: column.to_string(),
                table_name: table_name.to_string(),
            });
        }
    }
    Ok(())
}

/// Coerces a JSON value into a record map.
///
/// Non-object rows are wrapped under a single `value` key so the result is
/// always tabular.
fn as_record(value: &Value) -> Record {
    match value {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

/// Flattens each row's nested `record_path` array into individual records,
/// hoisting the parent's `meta` fields under the configured prefix.
fn flatten_records(rows: &[Value], record_path: &str, options: &LoadOptions) -> Vec<Record> {
    let prefix = options.meta_prefix.as_deref().unwrap_or("");
    let mut records = Vec::new();

    for row in rows {
        let Some(nested) = row.get(record_path).and_then(Value::as_array) else {
            continue;
        };
        for element in nested {
            let mut record = as_record(element);
            for meta_field in &options.meta {
                if let Some(value) = row.get(meta_field) {
                    record.insert(format!("{prefix}{meta_field}"), value.clone());
                }
            }
            records.push(record);
        }
    }

    records
}
