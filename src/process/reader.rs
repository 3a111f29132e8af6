use anyhow::{bail, Context, Result};
use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs::{self, File},
    io::{BufReader, Cursor},
    path::Path,
    sync::Arc,
};

/// How cell values are typed on a full read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Per-column type inference; empty cells read as null.
    #[default]
    Infer,
    /// Every column is text and empty cells stay empty strings, so only cells a
    /// file never had end up null after the column union.
    Strict,
}

/// Shared CSV reader for the per-filing tables.
///
/// Two entry points: [`CsvReader::read_header`] touches only row 0 and never
/// types anything, [`CsvReader::read_table`] loads the whole file.
#[derive(Debug, Clone)]
pub struct CsvReader {
    batch_size: usize,
    infer_records: Option<usize>,
}

impl Default for CsvReader {
    fn default() -> Self {
        Self {
            batch_size: 8_192,
            infer_records: None,
        }
    }
}

impl CsvReader {
    pub fn new(batch_size: usize, infer_records: Option<usize>) -> Self {
        Self {
            batch_size,
            infer_records,
        }
    }

    fn format(&self) -> Format {
        Format::default()
            .with_header(true)
            .with_delimiter(b',')
            .with_quote(b'"')
            .with_truncated_rows(true)
    }

    /// Column names from the first row, as written (BOM stripped, duplicates kept).
    ///
    /// A file without a header row is an error, not an empty header.
    pub fn read_header(&self, path: &Path) -> Result<Vec<String>> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let (schema, _) = self
            .format()
            .infer_schema(BufReader::new(file), Some(0))
            .with_context(|| format!("reading header of {}", path.display()))?;

        let mut names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        if names.is_empty() {
            bail!("{} has no header row", path.display());
        }
        strip_bom(&mut names);
        Ok(names)
    }

    /// Read every row of `path` into one batch.
    ///
    /// Repeated header names are renamed `name.1`, `name.2`, ... so the batch can
    /// later be matched by column name. Rows that end early are padded with
    /// nulls; rows with more fields than the header are an error.
    pub fn read_table(&self, path: &Path, mode: ReadMode) -> Result<RecordBatch> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;

        let mut format = self.format();
        if mode == ReadMode::Strict {
            format = format.with_null_regex(never_null()?);
        }

        let (inferred, _) = format
            .infer_schema(Cursor::new(&bytes), self.infer_records)
            .with_context(|| format!("inferring schema of {}", path.display()))?;
        if inferred.fields().is_empty() {
            bail!("{} has no header row", path.display());
        }

        let mut names: Vec<String> = inferred
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        strip_bom(&mut names);
        let names = disambiguate(&names);

        let fields: Vec<Field> = inferred
            .fields()
            .iter()
            .zip(names)
            .map(|(f, name)| {
                let ty = match mode {
                    ReadMode::Infer => f.data_type().clone(),
                    ReadMode::Strict => DataType::Utf8,
                };
                Field::new(name, ty, true)
            })
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .with_truncated_rows(true)
            .with_batch_size(self.batch_size)
            .build(Cursor::new(&bytes))
            .with_context(|| format!("creating CSV reader for {}", path.display()))?;

        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("parsing {}", path.display()))?;

        concat_batches(&schema, &batches).context("concatenating CSV batches")
    }
}

/// A pattern that matches no input, so no cell is ever treated as null.
fn never_null() -> Result<Regex> {
    Regex::new(r"[^\s\S]").context("compiling null pattern")
}

fn strip_bom(names: &mut [String]) {
    if let Some(first) = names.first_mut() {
        if let Some(rest) = first.strip_prefix('\u{feff}') {
            *first = rest.to_string();
        }
    }
}

/// Rename repeated names so every column is addressable: `b,b,b` -> `b,b.1,b.2`.
pub fn disambiguate(names: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        if seen.insert(name.as_str()) {
            out.push(name.clone());
            continue;
        }
        let mut k = 1;
        let renamed = loop {
            let candidate = format!("{}.{}", name, k);
            if !taken.contains(&candidate) {
                break candidate;
            }
            k += 1;
        };
        taken.insert(renamed.clone());
        out.push(renamed);
    }

    out
}
