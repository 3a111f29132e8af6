//! Header-only schema checks over a group-keyed directory tree.
//!
//! Every discovered CSV yields exactly one [`ValidationEntry`]; a file that
//! cannot be read is recorded as [`ValidationStatus::ReadError`] rather than
//! aborting the scan.

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use serde::Serialize;
use std::{collections::HashSet, fmt, path::Path, sync::Arc};
use tracing::{info, warn};

use crate::{
    discover::discover_csv_files,
    process::CsvReader,
    schema::{SOURCE_FILE, SOURCE_YEAR},
};

/// How an absent diff field (file never checked) is spelled on disk.
pub const ABSENT_MARKER: &str = "NA";

/// Separator used when joining column names into one log cell.
const JOIN: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Bad,
    ReadError,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Ok => "ok",
            ValidationStatus::Bad => "bad",
            ValidationStatus::ReadError => "read_error",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column differences between one header and the required set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnCheck {
    /// Required columns not in the header, in declaration order.
    pub missing: Vec<String>,
    /// Names appearing more than once, in order of their second occurrence.
    pub duplicates: Vec<String>,
    /// Header columns outside the required set, first occurrence only.
    pub extras: Vec<String>,
}

impl ColumnCheck {
    pub fn status(&self) -> ValidationStatus {
        if self.missing.is_empty() && self.duplicates.is_empty() {
            ValidationStatus::Ok
        } else {
            ValidationStatus::Bad
        }
    }
}

pub fn check_columns(header: &[String], required: &[String]) -> ColumnCheck {
    let present: HashSet<&str> = header.iter().map(String::as_str).collect();
    let required_set: HashSet<&str> = required.iter().map(String::as_str).collect();

    let mut check = ColumnCheck::default();

    let mut reported: HashSet<&str> = HashSet::new();
    for name in required {
        if !present.contains(name.as_str()) && reported.insert(name.as_str()) {
            check.missing.push(name.clone());
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicated: HashSet<&str> = HashSet::new();
    let mut extra_seen: HashSet<&str> = HashSet::new();
    for name in header {
        if !seen.insert(name.as_str()) && duplicated.insert(name.as_str()) {
            check.duplicates.push(name.clone());
        }
        if !required_set.contains(name.as_str()) && extra_seen.insert(name.as_str()) {
            check.extras.push(name.clone());
        }
    }

    check
}

/// One row of the `*_colissues.csv` log.
///
/// The diff fields are `None` when the file could not be checked at all and
/// `Some("")` when it was checked and nothing was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationEntry {
    pub source_file: String,
    pub source_year: String,
    pub status: ValidationStatus,
    pub missing_cols: Option<String>,
    pub duplicate_cols: Option<String>,
    pub extra_cols: Option<String>,
}

impl ValidationEntry {
    fn checked(source_file: &str, source_year: &str, check: &ColumnCheck) -> Self {
        Self {
            source_file: source_file.to_string(),
            source_year: source_year.to_string(),
            status: check.status(),
            missing_cols: Some(check.missing.join(JOIN)),
            duplicate_cols: Some(check.duplicates.join(JOIN)),
            extra_cols: Some(check.extras.join(JOIN)),
        }
    }

    fn unreadable(source_file: &str, source_year: &str) -> Self {
        Self {
            source_file: source_file.to_string(),
            source_year: source_year.to_string(),
            status: ValidationStatus::ReadError,
            missing_cols: None,
            duplicate_cols: None,
            extra_cols: None,
        }
    }
}

/// Narrow audit row for files that failed validation; extras are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadFile {
    pub source_file: String,
    pub source_year: String,
    pub status: ValidationStatus,
    pub missing_cols: Option<String>,
    pub duplicate_cols: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationLog {
    pub entries: Vec<ValidationEntry>,
}

impl ValidationLog {
    pub fn extend(&mut self, other: ValidationLog) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: ValidationStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Every entry whose status is not `ok`.
    pub fn bad_files(&self) -> Vec<BadFile> {
        self.entries
            .iter()
            .filter(|e| e.status != ValidationStatus::Ok)
            .map(|e| BadFile {
                source_file: e.source_file.clone(),
                source_year: e.source_year.clone(),
                status: e.status,
                missing_cols: e.missing_cols.clone(),
                duplicate_cols: e.duplicate_cols.clone(),
            })
            .collect()
    }

    /// Log as an all-text batch; absent diff fields become nulls.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Schema::new(vec![
            Field::new(SOURCE_FILE, DataType::Utf8, false),
            Field::new(SOURCE_YEAR, DataType::Utf8, false),
            Field::new("status", DataType::Utf8, false),
            Field::new("missing_cols", DataType::Utf8, true),
            Field::new("duplicate_cols", DataType::Utf8, true),
            Field::new("extra_cols", DataType::Utf8, true),
        ]);

        let e = &self.entries;
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                e.iter().map(|x| x.source_file.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                e.iter().map(|x| x.source_year.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                e.iter().map(|x| x.status.as_str()),
            )),
            Arc::new(StringArray::from_iter(
                e.iter().map(|x| x.missing_cols.as_deref()),
            )),
            Arc::new(StringArray::from_iter(
                e.iter().map(|x| x.duplicate_cols.as_deref()),
            )),
            Arc::new(StringArray::from_iter(
                e.iter().map(|x| x.extra_cols.as_deref()),
            )),
        ];

        RecordBatch::try_new(Arc::new(schema), columns).context("building validation log batch")
    }
}

/// Check the header of every CSV under `root/{group}` against `required`.
///
/// Never fails: missing group directories are skipped and unreadable files are
/// logged as `read_error`.
pub fn validate_directory(
    reader: &CsvReader,
    root: &Path,
    required: &[String],
    groups: &[String],
) -> ValidationLog {
    let files = discover_csv_files(root, groups);
    info!("validating {} CSV files under {}", files.len(), root.display());

    let entries = files
        .iter()
        .map(|file| match reader.read_header(&file.path) {
            Ok(header) => {
                let check = check_columns(&header, required);
                let entry = ValidationEntry::checked(&file.file_name, &file.group, &check);
                if entry.status != ValidationStatus::Ok {
                    warn!(
                        file = %file.file_name,
                        group = %file.group,
                        missing = ?check.missing,
                        duplicates = ?check.duplicates,
                        "column check failed"
                    );
                }
                entry
            }
            Err(e) => {
                warn!(
                    file = %file.file_name,
                    group = %file.group,
                    "header unreadable: {:#}",
                    e
                );
                ValidationEntry::unreadable(&file.file_name, &file.group)
            }
        })
        .collect();

    ValidationLog { entries }
}
