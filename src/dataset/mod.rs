//! Typed accessors over a downloaded synthetic dataset.
//!
//! Each accessor loads one table family from the data root, validates the
//! schema version, and exposes the records plus the common filters. The
//! records stay as JSON maps; the value here is file discovery, flattening,
//! and validation, not a typed object model.

mod captures;
mod metrics;
mod references;

pub use captures::Captures;
pub use metrics::Metrics;
pub use references::{AnnotationDefinitions, Egos, MetricDefinitions, Sensors};

use serde_json::Value;

use crate::table::Record;

/// Whether a record's `column` value equals `def_id`.
///
/// Definition ids are usually strings, but numeric ids appear in older
/// datasets; both compare by their textual form.
fn matches_definition(record: &Record, column: &str, def_id: &str) -> bool {
    match record.get(column) {
        Some(Value::String(s)) => s == def_id,
        Some(other) => other.to_string() == def_id,
        None => false,
    }
}
