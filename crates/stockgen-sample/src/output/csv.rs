use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::errors::{Result, SampleError};
use crate::sample_table::SampleTable;

/// Size and digest of a written sample file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub bytes: u64,
    pub sha256: String,
}

/// Write the sample table as CSV: building id first, then characteristics by name.
///
/// Rows go to a sibling temp file that replaces `path` only once complete.
pub fn write_sample_csv(
    path: &Path,
    table: &SampleTable,
    identity_column: &str,
) -> Result<WrittenOutput> {
    if table.has_column(identity_column) {
        return Err(SampleError::InvalidOptions(format!(
            "identity column '{identity_column}' collides with a characteristic"
        )));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path)?;
    match write_rows(&tmp_path, table, identity_column) {
        Ok(written) => {
            std::fs::rename(&tmp_path, path)?;
            Ok(written)
        }
        Err(err) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(err)
        }
    }
}

fn write_rows(path: &Path, table: &SampleTable, identity_column: &str) -> Result<WrittenOutput> {
    let file = File::create(path)?;
    let digesting = DigestWriter::new(BufWriter::new(file));
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(digesting);

    let columns: Vec<_> = table.columns().collect();

    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push(identity_column);
    header.extend(columns.iter().map(|column| column.name()));
    writer.write_record(&header)?;

    let mut record = Vec::with_capacity(columns.len() + 1);
    for row in 0..table.len() {
        record.clear();
        record.push((row + 1).to_string());
        for column in &columns {
            record.push(column.label(row).unwrap_or_default().to_string());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let digesting = writer.into_inner().map_err(|err| err.into_error())?;
    let (inner, bytes, sha256) = digesting.finish();
    let file = inner.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;

    Ok(WrittenOutput { bytes, sha256 })
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        SampleError::InvalidOptions(format!("invalid output path '{}'", path.display()))
    })?;
    let tmp_name = format!("{}.tmp", file_name.to_string_lossy());
    Ok(path.with_file_name(tmp_name))
}

/// Counts and hashes everything written through it.
struct DigestWriter<W: Write> {
    inner: W,
    bytes: u64,
    hasher: Sha256,
}

impl<W: Write> DigestWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            bytes: 0,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> (W, u64, String) {
        (self.inner, self.bytes, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.hasher.update(&buf[..size]);
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
