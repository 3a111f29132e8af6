//! Full-content concatenation of per-filing CSVs into one combined table.

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use rayon::prelude::*;
use serde::Serialize;
use std::{path::Path, sync::Arc, time::Instant};
use tracing::{info, warn};

use crate::{
    discover::{discover_csv_files, SourceFile},
    process::{ColumnUnion, CsvReader, ReadMode},
    schema::{DocumentType, PROVENANCE_COLUMNS, SOURCE_FILE, SOURCE_YEAR},
};

/// A file left out of the combined table because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedFile {
    pub source_file: String,
    pub source_year: String,
    pub error: String,
}

/// Provenance-tagged union of every readable CSV for one document type.
#[derive(Debug, Clone)]
pub struct CombinedTable {
    pub doc_type: DocumentType,
    pub batch: RecordBatch,
    pub files_read: usize,
    pub dropped: Vec<DroppedFile>,
}

impl CombinedTable {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }
}

/// Read every CSV under `root/{group}` and stack them into one table.
///
/// Files are read in parallel but combined in group order then file-name
/// order. An unreadable file is logged and dropped; only a failure to stitch
/// the readable ones together is returned as an error.
pub fn aggregate_directory(
    reader: &CsvReader,
    root: &Path,
    doc_type: DocumentType,
    groups: &[String],
    mode: ReadMode,
) -> Result<CombinedTable> {
    let start = Instant::now();
    let files = discover_csv_files(root, groups);
    info!(
        doc_type = %doc_type,
        "found {} CSV files under {}",
        files.len(),
        root.display()
    );

    let results: Vec<(&SourceFile, Result<RecordBatch>)> = files
        .par_iter()
        .map(|file| (file, load_file(reader, file, mode)))
        .collect();

    let mut union = ColumnUnion::new();
    let mut dropped = Vec::new();
    for (file, result) in results {
        match result {
            Ok(batch) => {
                info!(
                    file = %file.file_name,
                    group = %file.group,
                    "loaded ({} rows)",
                    batch.num_rows()
                );
                union.push(batch);
            }
            Err(e) => {
                warn!(
                    file = %file.file_name,
                    group = %file.group,
                    "failed to load, dropping: {:#}",
                    e
                );
                dropped.push(DroppedFile {
                    source_file: file.file_name.clone(),
                    source_year: file.group.clone(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    let files_read = union.num_batches();
    let batch = union
        .finish()
        .with_context(|| format!("combining {} tables", doc_type))?;

    info!(
        doc_type = %doc_type,
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        dropped = dropped.len(),
        elapsed = ?start.elapsed(),
        "combined {} files",
        files_read
    );

    Ok(CombinedTable {
        doc_type,
        batch,
        files_read,
        dropped,
    })
}

fn load_file(reader: &CsvReader, file: &SourceFile, mode: ReadMode) -> Result<RecordBatch> {
    let batch = reader.read_table(&file.path, mode)?;
    with_provenance(&batch, &file.file_name, &file.group)
}

/// Append `source_file` and `source_year` to every row, replacing any columns
/// of the same name the file already carried.
pub fn with_provenance(batch: &RecordBatch, file_name: &str, group: &str) -> Result<RecordBatch> {
    let rows = batch.num_rows();
    let schema = batch.schema();

    let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len() + 2);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 2);
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if PROVENANCE_COLUMNS.contains(&field.name().as_str()) {
            continue;
        }
        fields.push(field.as_ref().clone());
        columns.push(column.clone());
    }

    fields.push(Field::new(SOURCE_FILE, DataType::Utf8, true));
    columns.push(Arc::new(StringArray::from(vec![file_name; rows])));
    fields.push(Field::new(SOURCE_YEAR, DataType::Utf8, true));
    columns.push(Arc::new(StringArray::from(vec![group; rows])));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("attaching provenance columns")
}
