use anyhow::{Context, Result};
use arrow::{
    array::{new_null_array, ArrayRef},
    compute::{cast, concat_batches},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// Accumulates batches with differing column sets and stitches them into one
/// wide batch.
///
/// Columns appear in first-seen order. A row whose source batch lacked a column
/// gets null in that column. When two batches disagree on a column's type the
/// column is widened: null-only columns adopt the other type, Int64 and Float64
/// meet at Float64, anything else becomes Utf8.
#[derive(Debug, Default)]
pub struct ColumnUnion {
    names: Vec<String>,
    types: Vec<DataType>,
    index: HashMap<String, usize>,
    batches: Vec<RecordBatch>,
}

impl ColumnUnion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, batch: RecordBatch) {
        for field in batch.schema().fields() {
            match self.index.get(field.name()) {
                Some(&i) => {
                    let merged = reconcile(&self.types[i], field.data_type());
                    if merged != self.types[i] {
                        debug!(
                            "column `{}` widened from {:?} to {:?}",
                            field.name(),
                            self.types[i],
                            merged
                        );
                        self.types[i] = merged;
                    }
                }
                None => {
                    self.index.insert(field.name().clone(), self.names.len());
                    self.names.push(field.name().clone());
                    self.types.push(field.data_type().clone());
                }
            }
        }
        self.batches.push(batch);
    }

    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    /// The unified schema, with columns that never held a value typed as Utf8.
    pub fn schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .names
            .iter()
            .zip(&self.types)
            .map(|(name, ty)| {
                let ty = match ty {
                    DataType::Null => DataType::Utf8,
                    other => other.clone(),
                };
                Field::new(name, ty, true)
            })
            .collect();
        Arc::new(Schema::new(fields))
    }

    /// Align every batch to the unified schema and concatenate in push order.
    ///
    /// With nothing pushed the result has no columns and no rows.
    pub fn finish(self) -> Result<RecordBatch> {
        if self.names.is_empty() {
            return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
        }

        let schema = self.schema();
        let aligned = self
            .batches
            .iter()
            .map(|b| align(b, &schema))
            .collect::<Result<Vec<_>>>()?;

        concat_batches(&schema, &aligned).context("concatenating aligned batches")
    }
}

fn reconcile(current: &DataType, incoming: &DataType) -> DataType {
    match (current, incoming) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

fn align(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let rows = batch.num_rows();
    let columns = schema
        .fields()
        .iter()
        .map(|field| -> Result<ArrayRef> {
            match batch.column_by_name(field.name()) {
                Some(col) if col.data_type() == field.data_type() => Ok(col.clone()),
                Some(col) => cast(col, field.data_type()).with_context(|| {
                    format!(
                        "casting column `{}` from {:?} to {:?}",
                        field.name(),
                        col.data_type(),
                        field.data_type()
                    )
                }),
                None => Ok(new_null_array(field.data_type(), rows)),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    RecordBatch::try_new(schema.clone(), columns).context("building aligned batch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array, NullArray, StringArray};

    fn batch(fields: Vec<Field>, columns: Vec<ArrayRef>) -> RecordBatch {
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
    }

    fn text(name: &str) -> Field {
        Field::new(name, DataType::Utf8, true)
    }

    fn strings(values: &[&str]) -> ArrayRef {
        Arc::new(StringArray::from(values.to_vec()))
    }

    #[test]
    fn drifted_schemas_fill_with_null() -> Result<()> {
        let mut union = ColumnUnion::new();
        union.push(batch(
            vec![text("A"), text("B")],
            vec![strings(&["a1", "a2"]), strings(&["b1", "b2"])],
        ));
        union.push(batch(
            vec![text("A"), text("C")],
            vec![strings(&["a3"]), strings(&["c3"])],
        ));

        let out = union.finish()?;
        let names: Vec<&str> = out
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(out.num_rows(), 3);

        let b = out.column_by_name("B").unwrap();
        let c = out.column_by_name("C").unwrap();
        assert!(b.is_valid(0) && b.is_valid(1) && b.is_null(2));
        assert!(c.is_null(0) && c.is_null(1) && c.is_valid(2));
        Ok(())
    }

    #[test]
    fn numeric_conflict_widens_to_float() -> Result<()> {
        let mut union = ColumnUnion::new();
        union.push(batch(
            vec![Field::new("f1", DataType::Int64, true)],
            vec![Arc::new(Int64Array::from(vec![100]))],
        ));
        union.push(batch(
            vec![Field::new("f1", DataType::Float64, true)],
            vec![Arc::new(Float64Array::from(vec![2.5]))],
        ));

        let out = union.finish()?;
        assert_eq!(out.schema().field(0).data_type(), &DataType::Float64);
        let f1 = out
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(f1.value(0), 100.0);
        assert_eq!(f1.value(1), 2.5);
        Ok(())
    }

    #[test]
    fn text_conflict_falls_back_to_utf8() -> Result<()> {
        let mut union = ColumnUnion::new();
        union.push(batch(
            vec![Field::new("Year", DataType::Int64, true)],
            vec![Arc::new(Int64Array::from(vec![2005]))],
        ));
        union.push(batch(vec![text("Year")], vec![strings(&["Unknown"])]));

        let out = union.finish()?;
        let year = out
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(year.value(0), "2005");
        assert_eq!(year.value(1), "Unknown");
        Ok(())
    }

    #[test]
    fn null_only_column_adopts_other_type() -> Result<()> {
        let mut union = ColumnUnion::new();
        union.push(batch(
            vec![Field::new("b10", DataType::Null, true)],
            vec![Arc::new(NullArray::new(2))],
        ));
        union.push(batch(
            vec![Field::new("b10", DataType::Int64, true)],
            vec![Arc::new(Int64Array::from(vec![7]))],
        ));

        let out = union.finish()?;
        assert_eq!(out.schema().field(0).data_type(), &DataType::Int64);
        assert_eq!(out.column(0).null_count(), 2);
        Ok(())
    }

    #[test]
    fn nothing_pushed_is_empty() -> Result<()> {
        let out = ColumnUnion::new().finish()?;
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.num_columns(), 0);
        Ok(())
    }
}
