use anyhow::{Context, Result};
use arrow::{csv::WriterBuilder, record_batch::RecordBatch};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::warn;

/// Write `batch` as CSV with a header row, replacing any existing file.
///
/// Nulls are written as `null_marker`. A batch without columns produces an
/// empty file. Returns the size of the written file.
pub fn write_csv(batch: &RecordBatch, path: &Path, null_marker: &str) -> Result<u64> {
    let tmp_path = tmp_path_for(path);
    staged(&tmp_path, path, || {
        let file = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        let mut out = BufWriter::new(file);

        if batch.num_columns() > 0 {
            let mut writer = WriterBuilder::new()
                .with_header(true)
                .with_null(null_marker.to_string())
                .build(&mut out);
            writer
                .write(batch)
                .with_context(|| format!("writing CSV rows to {}", tmp_path.display()))?;
        }

        out.flush()
            .with_context(|| format!("flushing {}", tmp_path.display()))
    })
}

/// Write `batch` as a single Snappy-compressed Parquet file, replacing any
/// existing file. A batch without columns is skipped and reports zero bytes.
pub fn write_parquet(batch: &RecordBatch, path: &Path) -> Result<u64> {
    if batch.num_columns() == 0 {
        warn!("no columns to write, skipping {}", path.display());
        return Ok(0);
    }

    let tmp_path = tmp_path_for(path);
    staged(&tmp_path, path, || {
        let file = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .context("creating parquet writer")?;
        writer.write(batch).context("writing batch to parquet")?;
        writer.close().context("closing parquet writer")?;
        Ok(())
    })
}

/// `<dir>/.<name>.tmp` next to the destination.
fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// Run `write` against `tmp_path`, then move it over `path`. On any failure
/// the temporary file is removed before the error is returned.
fn staged<F>(tmp_path: &Path, path: &Path, write: F) -> Result<u64>
where
    F: FnOnce() -> Result<()>,
{
    let result = write().and_then(|()| commit(tmp_path, path));
    if result.is_err() && tmp_path.exists() {
        if let Err(e) = fs::remove_file(tmp_path) {
            warn!("failed to remove {}: {}", tmp_path.display(), e);
        }
    }
    result
}

fn commit(tmp_path: &Path, path: &Path) -> Result<u64> {
    fs::rename(tmp_path, path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    let metadata = fs::metadata(path).context("getting file metadata")?;
    Ok(metadata.len())
}
