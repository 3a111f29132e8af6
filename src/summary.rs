// src/summary.rs

use anyhow::{Context, Result};
use arrow::{
    array::{Array, StringArray},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
};
use serde::Serialize;
use std::{collections::BTreeMap, fs, path::Path};

use crate::{
    aggregate::{CombinedTable, DroppedFile},
    schema::DocumentType,
    validate::{ValidationLog, ValidationStatus},
};

/// Column the extraction step fills with `both` / `insiders` / `securities` / `none`.
pub const TABLE_PRESENCE: &str = "table presence";

/// Per-document-type figures for one run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DocumentSummary {
    pub doc_type: DocumentType,
    pub files_validated: usize,
    pub files_ok: usize,
    pub files_bad: usize,
    pub files_unreadable: usize,
    pub files_aggregated: usize,
    pub files_dropped: Vec<DroppedFile>,
    pub rows: usize,
    pub columns: usize,
    /// Row count per `table presence` value; rows without one count under `missing`.
    pub table_presence: BTreeMap<String, usize>,
}

impl DocumentSummary {
    pub fn new(log: &ValidationLog, table: &CombinedTable, written: &RecordBatch) -> Self {
        Self {
            doc_type: table.doc_type,
            files_validated: log.len(),
            files_ok: log.count(ValidationStatus::Ok),
            files_bad: log.count(ValidationStatus::Bad),
            files_unreadable: log.count(ValidationStatus::ReadError),
            files_aggregated: table.files_read,
            files_dropped: table.dropped.clone(),
            rows: written.num_rows(),
            columns: written.num_columns(),
            table_presence: presence_counts(written),
        }
    }
}

/// Run figures written next to the outputs. Holds no timestamps, so unchanged
/// input gives a byte-identical file.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub groups: Vec<String>,
    pub documents: Vec<DocumentSummary>,
}

impl RunSummary {
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut text = serde_json::to_string_pretty(self).context("serializing run summary")?;
        text.push('\n');
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }
}

/// Tally `table presence` values; empty when the column is absent.
pub fn presence_counts(batch: &RecordBatch) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let Some(column) = batch.column_by_name(TABLE_PRESENCE) else {
        return counts;
    };
    let Ok(column) = cast(column, &DataType::Utf8) else {
        return counts;
    };
    let Some(values) = column.as_any().downcast_ref::<StringArray>() else {
        return counts;
    };

    for value in values.iter() {
        let key = match value {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => "missing".to_string(),
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    #[test]
    fn counts_presence_values() {
        let schema = Schema::new(vec![Field::new(TABLE_PRESENCE, DataType::Utf8, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(vec![
                Some("both"),
                Some("insiders"),
                Some("both"),
                None,
            ]))],
        )
        .unwrap();

        let counts = presence_counts(&batch);
        assert_eq!(counts.get("both"), Some(&2));
        assert_eq!(counts.get("insiders"), Some(&1));
        assert_eq!(counts.get("missing"), Some(&1));
    }

    #[test]
    fn absent_presence_column_is_empty() {
        let batch = RecordBatch::new_empty(Arc::new(Schema::empty()));
        assert!(presence_counts(&batch).is_empty());
    }
}
