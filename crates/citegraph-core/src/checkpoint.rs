//! Checkpoint Store
//!
//! Derived artifacts (identifier maps, edge streams) are gzip-compressed,
//! tab-separated, two-column files. Writes go to a sibling `.partial` file
//! that is renamed into place only once the gzip stream has been finished
//! and synced, so existence of the final path means the artifact is complete.
//!
//! [`Persisting`] is the tee stage: it forwards every item of an upstream
//! iterator while appending it to a [`TsvWriter`], and commits the writer
//! when the upstream is exhausted. The cached branch streams a [`TsvReader`]
//! through the same item type so consumers never see which branch ran.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::error::{CiteGraphError, Result};
use crate::identifier::Edge;

/// Suffix of in-progress artifacts
const PARTIAL_SUFFIX: &str = ".partial";

/// A value stored as one two-column row
pub trait TsvRecord: Sized {
    fn to_row(&self) -> (&str, &str);
    fn from_row(left: String, right: String) -> Self;
}

impl TsvRecord for Edge {
    fn to_row(&self) -> (&str, &str) {
        (&self.source, &self.target)
    }

    fn from_row(left: String, right: String) -> Self {
        Edge::new(left, right)
    }
}

impl TsvRecord for (String, String) {
    fn to_row(&self) -> (&str, &str) {
        (&self.0, &self.1)
    }

    fn from_row(left: String, right: String) -> Self {
        (left, right)
    }
}

/// Whether a completed artifact exists at `path`
pub fn artifact_exists(path: &Path) -> bool {
    path.is_file()
}

/// Rename a fully synced `from` onto `to` and sync the parent directory, so
/// the rename itself survives a crash.
pub fn commit_rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)?;
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        sync_dir(parent)?;
    }
    Ok(())
}

/// Flush a directory's entries to disk
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Sibling path used while an artifact is being written
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

type GzCsvWriter = csv::Writer<GzEncoder<BufWriter<File>>>;

/// Writer for a gzip TSV artifact with atomic completion
pub struct TsvWriter {
    final_path: PathBuf,
    partial_path: PathBuf,
    inner: Option<GzCsvWriter>,
    rows: u64,
}

impl TsvWriter {
    /// Start writing an artifact destined for `path`.
    ///
    /// A stale `.partial` file left by an interrupted run is truncated.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = partial_path(path);
        if partial.exists() {
            warn!(path = %partial.display(), "Discarding stale partial artifact");
        }
        let file = File::create(&partial)?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let inner = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(encoder);

        Ok(Self {
            final_path: path.to_path_buf(),
            partial_path: partial,
            inner: Some(inner),
            rows: 0,
        })
    }

    /// Append one row
    pub fn write_row(&mut self, left: &str, right: &str) -> Result<()> {
        if let Some(inner) = self.inner.as_mut() {
            inner.write_record([left, right])?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn write_record<R: TsvRecord>(&mut self, record: &R) -> Result<()> {
        let (left, right) = record.to_row();
        self.write_row(left, right)
    }

    /// Flush, sync and move the artifact into its final location.
    ///
    /// Returns the number of rows written.
    pub fn finish(mut self) -> Result<u64> {
        let Some(inner) = self.inner.take() else {
            return Ok(self.rows);
        };
        let encoder = inner.into_inner().map_err(|e| e.into_error())?;
        let buffered = encoder.finish()?;
        let file = buffered.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        commit_rename(&self.partial_path, &self.final_path)?;
        debug!(
            path = %self.final_path.display(),
            rows = self.rows,
            "Committed artifact"
        );
        Ok(self.rows)
    }
}

impl Drop for TsvWriter {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            if let Err(e) = fs::remove_file(&self.partial_path) {
                debug!(
                    path = %self.partial_path.display(),
                    "Could not remove partial artifact: {}",
                    e
                );
            }
        }
    }
}

type GzCsvRecords = csv::StringRecordsIntoIter<GzDecoder<BufReader<File>>>;

/// Streaming reader over a completed gzip TSV artifact
pub struct TsvReader {
    path: PathBuf,
    records: GzCsvRecords,
    line: u64,
    failed: bool,
}

impl TsvReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        let records = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(decoder)
            .into_records();

        Ok(Self {
            path: path.to_path_buf(),
            records,
            line: 0,
            failed: false,
        })
    }

    /// Read the first row as a header, failing if the artifact is empty
    pub fn read_header(&mut self) -> Result<(String, String)> {
        match self.next() {
            Some(row) => row,
            None => Err(CiteGraphError::corrupt(&self.path, "missing header row")),
        }
    }

    /// Adapt this reader into a stream of typed records
    pub fn records<R: TsvRecord>(self) -> impl Iterator<Item = Result<R>> {
        self.map(|row| row.map(|(left, right)| R::from_row(left, right)))
    }
}

impl Iterator for TsvReader {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => {
                self.failed = true;
                return Some(Err(CiteGraphError::corrupt(&self.path, e.to_string())));
            }
        };
        self.line += 1;

        if record.len() != 2 {
            self.failed = true;
            return Some(Err(CiteGraphError::corrupt(
                &self.path,
                format!(
                    "line {}: expected 2 columns, found {}",
                    self.line,
                    record.len()
                ),
            )));
        }
        Some(Ok((record[0].to_string(), record[1].to_string())))
    }
}

/// Tee stage that persists every item it forwards.
///
/// The artifact is committed when the upstream is exhausted. If the upstream
/// yields an error, or the stage is dropped before exhaustion, the partial
/// file is discarded and no artifact appears at the final path.
pub struct Persisting<I, R> {
    upstream: I,
    writer: Option<TsvWriter>,
    _record: PhantomData<R>,
}

impl<I, R> Persisting<I, R>
where
    I: Iterator<Item = Result<R>>,
    R: TsvRecord,
{
    pub fn new(upstream: I, writer: TsvWriter) -> Self {
        Self {
            upstream,
            writer: Some(writer),
            _record: PhantomData,
        }
    }
}

impl<I, R> Iterator for Persisting<I, R>
where
    I: Iterator<Item = Result<R>>,
    R: TsvRecord,
{
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let writer = self.writer.as_mut()?;
        match self.upstream.next() {
            Some(Ok(record)) => {
                if let Err(e) = writer.write_record(&record) {
                    self.writer = None;
                    return Some(Err(e));
                }
                Some(Ok(record))
            }
            Some(Err(e)) => {
                self.writer = None;
                Some(Err(e))
            }
            None => {
                let writer = self.writer.take()?;
                match writer.finish() {
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            }
        }
    }
}
