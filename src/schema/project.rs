// src/schema/project.rs

use arrow::{
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use super::types::DocumentType;
use crate::error::PipelineError;

/// Reorder and restrict `batch` to exactly `columns`.
///
/// Every requested column must exist; the error lists all absent ones so the
/// operator sees the full extent of the drift at once. A batch with no columns
/// at all (nothing was aggregated) yields an empty table carrying the requested
/// header.
pub fn project_columns(
    batch: &RecordBatch,
    doc_type: DocumentType,
    columns: &[String],
) -> Result<RecordBatch, PipelineError> {
    let schema = batch.schema();

    if schema.fields().is_empty() {
        let fields: Vec<Field> = columns
            .iter()
            .map(|c| Field::new(c, DataType::Utf8, true))
            .collect();
        return Ok(RecordBatch::new_empty(Arc::new(Schema::new(fields))));
    }

    let mut indices = Vec::with_capacity(columns.len());
    let mut missing = Vec::new();
    for name in columns {
        match schema.index_of(name) {
            Ok(i) => indices.push(i),
            Err(_) => missing.push(name.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(PipelineError::MissingPublishedColumns { doc_type, missing });
    }

    Ok(batch.project(&indices)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, StringArray};

    fn batch(cols: &[(&str, &[&str])]) -> RecordBatch {
        let fields: Vec<Field> = cols
            .iter()
            .map(|(n, _)| Field::new(*n, DataType::Utf8, true))
            .collect();
        let arrays: Vec<ArrayRef> = cols
            .iter()
            .map(|(_, v)| Arc::new(StringArray::from(v.to_vec())) as ArrayRef)
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    fn names(batch: &RecordBatch) -> Vec<String> {
        batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    #[test]
    fn reorders_and_drops_unlisted() {
        let b = batch(&[("c", &["3"]), ("a", &["1"]), ("b", &["2"])]);
        let out = project_columns(
            &b,
            DocumentType::Insiders,
            &["a".to_string(), "c".to_string()],
        )
        .unwrap();
        assert_eq!(names(&out), vec!["a", "c"]);
        assert_eq!(out.num_rows(), 1);
    }

    #[test]
    fn missing_column_is_named() {
        let b = batch(&[("a2", &["x"]), ("b9", &["5%"])]);
        let wanted = vec![
            "a2".to_string(),
            "b9".to_string(),
            "b9_full_voting_shares_text".to_string(),
        ];
        let err = project_columns(&b, DocumentType::Insiders, &wanted).unwrap_err();
        match &err {
            PipelineError::MissingPublishedColumns { doc_type, missing } => {
                assert_eq!(*doc_type, DocumentType::Insiders);
                assert_eq!(missing, &vec!["b9_full_voting_shares_text".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("b9_full_voting_shares_text"));
    }

    #[test]
    fn columnless_batch_gets_requested_header() {
        let empty = RecordBatch::new_empty(Arc::new(Schema::empty()));
        let out = project_columns(
            &empty,
            DocumentType::Insiders,
            &["a2".to_string(), "b2".to_string()],
        )
        .unwrap();
        assert_eq!(names(&out), vec!["a2", "b2"]);
        assert_eq!(out.num_rows(), 0);
    }
}
