//! Raw archive collaborators
//!
//! The pipeline only needs two things from the bulk dumps: the `id` field of
//! every metadata record, and the first column of every citation row. Both
//! are exposed as traits so callers can plug in other containers; the
//! file-backed readers here handle the tar.gz-of-CSV metadata dump and the
//! zip-of-CSV citation dump.
//!
//! Tar and zip entries borrow their archive, so the file-backed readers run
//! on a dedicated reader thread and hand rows over in batches through a
//! bounded channel. Row order is preserved.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::{self, JoinHandle};

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};

use crate::error::{CiteGraphError, Result};

/// Rows per channel message
const CHANNEL_BATCH: usize = 4096;

/// Messages buffered between reader thread and consumer
const CHANNEL_DEPTH: usize = 16;

/// Name of the metadata column holding the identifier bundle
const ID_COLUMN: &str = "id";

/// Boxed fallible row stream
pub type RowStream<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// One document from the metadata dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Whitespace-separated compact URIs, e.g. `omid:br/0612 doi:10.1/x pmid:123`
    pub id: String,
}

impl MetadataRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Source of per-document identifier bundles
pub trait MetadataArchive: Send + Sync {
    /// Stream every record; I/O failures surface as errors and end the stream
    fn records(&self) -> Result<RowStream<MetadataRecord>>;
}

/// Source of raw citation rows (`oci:LEFT-RIGHT`)
pub trait CitationArchive: Send + Sync {
    /// Stream the first column of every row across all archive files
    fn rows(&self) -> Result<RowStream<String>>;
}

// ============================================================================
// Channel-backed streaming
// ============================================================================

/// Pull iterator over rows produced on a reader thread
pub struct ChannelStream<T> {
    rx: Receiver<Result<Vec<T>>>,
    buffer: std::vec::IntoIter<T>,
    handle: Option<JoinHandle<()>>,
    done: bool,
}

impl<T> Iterator for ChannelStream<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            match self.rx.recv() {
                Ok(Ok(batch)) => self.buffer = batch.into_iter(),
                Ok(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Err(_) => {
                    self.done = true;
                    if let Some(handle) = self.handle.take() {
                        if handle.join().is_err() {
                            return Some(Err(CiteGraphError::archive(
                                "<reader thread>",
                                "archive reader panicked",
                            )));
                        }
                    }
                    return None;
                }
            }
        }
    }
}

/// Run `produce` on a named reader thread and stream what it emits.
///
/// The emitter returns `false` once the consumer has gone away; producers
/// should stop reading at that point.
pub fn spawn_stream<T, F>(name: &str, produce: F) -> Result<ChannelStream<T>>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn FnMut(T) -> bool) -> Result<()> + Send + 'static,
{
    let (tx, rx) = sync_channel::<Result<Vec<T>>>(CHANNEL_DEPTH);
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let mut batch = Vec::with_capacity(CHANNEL_BATCH);
            let mut open = true;
            let mut emit = |item: T| {
                batch.push(item);
                if batch.len() >= CHANNEL_BATCH {
                    let full = std::mem::replace(&mut batch, Vec::with_capacity(CHANNEL_BATCH));
                    open = tx.send(Ok(full)).is_ok();
                }
                open
            };
            let result = produce(&mut emit);

            // Rows read before a failure are delivered ahead of the error
            if open && !batch.is_empty() {
                open = tx.send(Ok(batch)).is_ok();
            }
            if let Err(e) = result {
                if open {
                    let _ = tx.send(Err(e));
                }
            }
        })?;

    Ok(ChannelStream {
        rx,
        buffer: Vec::new().into_iter(),
        handle: Some(handle),
        done: false,
    })
}

fn is_io_error(e: &csv::Error) -> bool {
    matches!(e.kind(), csv::ErrorKind::Io(_))
}

fn is_csv_entry(name: &Path) -> bool {
    name.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

// ============================================================================
// File-backed readers
// ============================================================================

/// Metadata dump packaged as a gzip-compressed tarball of CSV files
#[derive(Debug, Clone)]
pub struct TarredCsvMetadata {
    path: PathBuf,
}

impl TarredCsvMetadata {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetadataArchive for TarredCsvMetadata {
    fn records(&self) -> Result<RowStream<MetadataRecord>> {
        let path = self.path.clone();
        let stream = spawn_stream("metadata-reader", move |emit| read_tarred_csvs(&path, emit))?;
        Ok(Box::new(stream))
    }
}

fn read_tarred_csvs(
    path: &Path,
    emit: &mut dyn FnMut(MetadataRecord) -> bool,
) -> Result<()> {
    let fail = |reason: String| CiteGraphError::archive(path, reason);

    let file = File::open(path).map_err(|e| fail(e.to_string()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    info!(archive = %path.display(), "Reading metadata archive");

    for entry in archive.entries().map_err(|e| fail(e.to_string()))? {
        let entry = entry.map_err(|e| fail(e.to_string()))?;
        let entry_name = entry.path().map_err(|e| fail(e.to_string()))?.into_owned();
        if !is_csv_entry(&entry_name) {
            continue;
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(entry);
        let headers = reader.headers().map_err(|e| fail(e.to_string()))?.clone();
        let Some(id_column) = headers.iter().position(|h| h == ID_COLUMN) else {
            warn!(entry = %entry_name.display(), "No '{}' column, skipping entry", ID_COLUMN);
            continue;
        };
        debug!(entry = %entry_name.display(), "Reading metadata entry");

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) if is_io_error(&e) => return Err(fail(e.to_string())),
                Err(e) => {
                    warn!(entry = %entry_name.display(), "Skipping unreadable metadata row: {}", e);
                    continue;
                }
            };
            let Some(id) = record.get(id_column) else {
                continue;
            };
            if !emit(MetadataRecord::new(id)) {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Citation dump packaged as one or more zip files of CSVs
#[derive(Debug, Clone)]
pub struct ZippedCsvCitations {
    paths: Vec<PathBuf>,
}

impl ZippedCsvCitations {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl CitationArchive for ZippedCsvCitations {
    fn rows(&self) -> Result<RowStream<String>> {
        let paths = self.paths.clone();
        let stream = spawn_stream("citation-reader", move |emit| {
            let total = paths.len();
            for (position, path) in paths.iter().enumerate() {
                info!(
                    archive = %path.display(),
                    "Reading citation archive {}/{}",
                    position + 1,
                    total
                );
                if !read_zipped_csvs(path, emit)? {
                    break;
                }
            }
            Ok(())
        })?;
        Ok(Box::new(stream))
    }
}

/// Returns `false` once the consumer stops listening
fn read_zipped_csvs(path: &Path, emit: &mut dyn FnMut(String) -> bool) -> Result<bool> {
    let fail = |reason: String| CiteGraphError::archive(path, reason);

    let file = File::open(path).map_err(|e| fail(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_dir() || !is_csv_entry(Path::new(entry.name())) {
            continue;
        }
        let entry_name = entry.name().to_string();
        debug!(entry = %entry_name, "Reading citation entry");

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(entry);
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) if is_io_error(&e) => return Err(fail(e.to_string())),
                Err(e) => {
                    warn!(entry = %entry_name, "Skipping unreadable citation row: {}", e);
                    continue;
                }
            };
            let Some(first) = record.get(0) else {
                continue;
            };
            if !emit(first.to_string()) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

// ============================================================================
// In-memory sources
// ============================================================================

/// Metadata records held in memory
#[derive(Debug, Clone, Default)]
pub struct VecMetadata {
    records: Vec<MetadataRecord>,
}

impl VecMetadata {
    pub fn new(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    /// Build from raw `id` field values
    pub fn from_ids<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self::new(ids.into_iter().map(MetadataRecord::new).collect())
    }
}

impl MetadataArchive for VecMetadata {
    fn records(&self) -> Result<RowStream<MetadataRecord>> {
        Ok(Box::new(self.records.clone().into_iter().map(Ok)))
    }
}

/// Citation rows held in memory
#[derive(Debug, Clone, Default)]
pub struct VecCitations {
    rows: Vec<String>,
}

impl VecCitations {
    pub fn new<S: Into<String>>(rows: impl IntoIterator<Item = S>) -> Self {
        Self {
            rows: rows.into_iter().map(Into::into).collect(),
        }
    }
}

impl CitationArchive for VecCitations {
    fn rows(&self) -> Result<RowStream<String>> {
        Ok(Box::new(self.rows.clone().into_iter().map(Ok)))
    }
}
