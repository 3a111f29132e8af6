use arrow::error::ArrowError;
use std::path::PathBuf;
use thiserror::Error;

use crate::schema::DocumentType;

/// Failures that stop a run. Per-file problems never surface here; they are
/// recorded in the validation log or dropped with a warning instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(
        "{doc_type} combined table is missing published column(s): {}",
        .missing.join(", ")
    )]
    MissingPublishedColumns {
        doc_type: DocumentType,
        missing: Vec<String>,
    },

    #[error("failed to write {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}
