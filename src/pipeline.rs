//! Driver: validate both trees, persist the logs, aggregate both trees,
//! project onto published columns, persist the combined tables.

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{info, warn};

use crate::{
    aggregate::aggregate_directory,
    config::PipelineConfig,
    error::PipelineError,
    process::{write_csv, write_parquet, CsvReader},
    schema::{project_columns, DocumentType},
    summary::{DocumentSummary, RunSummary},
    validate::{validate_directory, ValidationLog, ABSENT_MARKER},
};

pub const SUMMARY_FILE: &str = "run_summary.json";

/// `{output}/{doc}_colissues.csv`
pub fn log_path(output_dir: &Path, doc_type: DocumentType) -> PathBuf {
    output_dir.join(format!("{}_colissues.csv", doc_type))
}

/// `{output}/{doc}_raw.{ext}`
pub fn combined_path(output_dir: &Path, doc_type: DocumentType, ext: &str) -> PathBuf {
    output_dir.join(format!("{}_raw.{}", doc_type, ext))
}

fn root_for(config: &PipelineConfig, doc_type: DocumentType) -> &Path {
    match doc_type {
        DocumentType::Securities => &config.securities_root,
        DocumentType::Insiders => &config.insiders_root,
    }
}

fn write_error(path: &Path, e: anyhow::Error) -> PipelineError {
    PipelineError::Write {
        path: path.to_path_buf(),
        reason: format!("{:#}", e),
    }
}

/// With an empty `null_marker`, a null cell and an empty-string cell are written identically.
fn persist_csv(batch: &RecordBatch, path: &Path, null_marker: &str) -> Result<(), PipelineError> {
    let bytes = write_csv(batch, path, null_marker).map_err(|e| write_error(path, e))?;
    info!(rows = batch.num_rows(), bytes, "wrote {}", path.display());
    Ok(())
}

fn ensure_output_dir(dir: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::Write {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Validation logs for both document types, in pipeline order.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub securities: ValidationLog,
    pub insiders: ValidationLog,
}

impl ValidationReport {
    pub fn get(&self, doc_type: DocumentType) -> &ValidationLog {
        match doc_type {
            DocumentType::Securities => &self.securities,
            DocumentType::Insiders => &self.insiders,
        }
    }

    /// Both logs concatenated, securities first.
    pub fn combined(&self) -> ValidationLog {
        let mut all = self.securities.clone();
        all.extend(self.insiders.clone());
        all
    }
}

/// Validate both trees and write `{doc}_colissues.csv` for each, even when empty.
pub fn run_validation(
    config: &PipelineConfig,
    reader: &CsvReader,
    groups: &[String],
) -> Result<ValidationReport> {
    ensure_output_dir(&config.output_dir)?;

    let mut report = ValidationReport::default();
    for doc_type in DocumentType::ALL {
        let required = &config.schemas.get(doc_type).required_file_columns;
        let log = validate_directory(reader, root_for(config, doc_type), required, groups);
        info!(
            doc_type = %doc_type,
            files = log.len(),
            bad = log.bad_files().len(),
            "validation finished"
        );

        let path = log_path(&config.output_dir, doc_type);
        persist_csv(&log.to_record_batch()?, &path, ABSENT_MARKER)?;

        match doc_type {
            DocumentType::Securities => report.securities = log,
            DocumentType::Insiders => report.insiders = log,
        }
    }

    Ok(report)
}

/// Run the whole batch and return what it did.
///
/// Per-file problems only show up in the logs and the summary. The run fails
/// when an output cannot be written or a published column is missing; in the
/// latter case no combined table is written.
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunSummary> {
    let start = Instant::now();
    let groups = config.groups.keys()?;
    let reader = CsvReader::default();
    info!(groups = groups.len(), "starting run");

    // ─── 1) validate + persist logs ─────────────────────────────────────
    let report = run_validation(config, &reader, &groups)?;

    // ─── 2) aggregate ───────────────────────────────────────────────────
    let mut tables = Vec::with_capacity(DocumentType::ALL.len());
    for doc_type in DocumentType::ALL {
        let table = aggregate_directory(
            &reader,
            root_for(config, doc_type),
            doc_type,
            &groups,
            config.read_mode(),
        )?;
        if !table.dropped.is_empty() {
            warn!(
                doc_type = %doc_type,
                "{} file(s) left out of the combined table",
                table.dropped.len()
            );
        }
        tables.push(table);
    }

    // ─── 3) project onto published columns ──────────────────────────────
    let mut outputs = Vec::with_capacity(tables.len());
    for table in &tables {
        let batch = match &config.schemas.get(table.doc_type).published_columns {
            Some(columns) => project_columns(&table.batch, table.doc_type, columns)?,
            None => table.batch.clone(),
        };
        outputs.push(batch);
    }

    // ─── 4) persist combined tables ─────────────────────────────────────
    let mut documents = Vec::with_capacity(tables.len());
    for (table, batch) in tables.iter().zip(&outputs) {
        let csv_path = combined_path(&config.output_dir, table.doc_type, "csv");
        persist_csv(batch, &csv_path, "")?;

        if config.write_parquet {
            let pq_path = combined_path(&config.output_dir, table.doc_type, "parquet");
            let bytes = write_parquet(batch, &pq_path).map_err(|e| write_error(&pq_path, e))?;
            info!(bytes, "wrote {}", pq_path.display());
        }

        documents.push(DocumentSummary::new(
            report.get(table.doc_type),
            table,
            batch,
        ));
    }

    // ─── 5) summary ─────────────────────────────────────────────────────
    let summary = RunSummary {
        groups,
        documents,
    };
    let summary_path = config.output_dir.join(SUMMARY_FILE);
    summary
        .write_json(&summary_path)
        .map_err(|e| write_error(&summary_path, e))?;

    info!(elapsed = ?start.elapsed(), "all done");
    Ok(summary)
}
