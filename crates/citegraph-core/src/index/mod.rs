//! Graph Index Module
//!
//! Persistent bidirectional adjacency indexes, one per vocabulary:
//! - `AdjacencyIndex`: `out_edges` / `in_edges` over local identifier values
//! - `IndexStore`: builds an index from an edge stream, or opens an existing one
//! - `SqliteIndexStore`: SQLite-backed store with atomic directory commit
//!
//! # Layout
//!
//! ```text
//! database-pmid/            (committed index)
//! └── graph.db
//! database-pmid.building/   (in-progress build, renamed on success)
//! ```

pub mod schema;
pub mod sqlite;

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::checkpoint::{commit_rename, sync_dir};
use crate::error::Result;
use crate::extractor::EdgeStream;
use crate::identifier::Vocabulary;

pub use schema::{INDEX_DB_FILE, INDEX_SCHEMA_VERSION};
pub use sqlite::{GraphIndex, IndexWriter};

/// Default edges per insert transaction
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Suffix of index directories under construction
const BUILDING_SUFFIX: &str = ".building";

/// Summary of a built index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub vocabulary: Vocabulary,
    pub edge_count: u64,
    pub schema_version: String,
    pub path: PathBuf,
}

/// Bidirectional adjacency lookups over local identifier values.
///
/// Unknown identifiers yield an empty list, never an error.
pub trait AdjacencyIndex: Send + Sync {
    fn vocabulary(&self) -> Vocabulary;

    /// Targets cited by `local`, in edge stream order
    fn out_edges(&self, local: &str) -> Result<Vec<String>>;

    /// Sources citing `local`, in edge stream order
    fn in_edges(&self, local: &str) -> Result<Vec<String>>;

    fn stats(&self) -> Result<IndexStats>;
}

/// Builds and opens persistent indexes at fixed directories
pub trait IndexStore: Send + Sync {
    /// Whether a committed index exists at `dir`
    fn exists(&self, dir: &Path) -> bool;

    /// One-shot bulk load of `edges` into a new index at `dir`.
    ///
    /// `estimated_edges` is a sizing hint and never affects the result.
    fn build(
        &self,
        dir: &Path,
        vocabulary: Vocabulary,
        edges: EdgeStream,
        estimated_edges: u64,
    ) -> Result<Arc<dyn AdjacencyIndex>>;

    fn open(&self, dir: &Path, vocabulary: Vocabulary) -> Result<Arc<dyn AdjacencyIndex>>;
}

/// Sibling directory used while an index is being built
pub fn building_dir(dir: &Path) -> PathBuf {
    let mut name: OsString = dir.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(BUILDING_SUFFIX);
    dir.with_file_name(name)
}

/// SQLite implementation of [`IndexStore`]
#[derive(Debug, Clone)]
pub struct SqliteIndexStore {
    batch_size: usize,
}

impl Default for SqliteIndexStore {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl SqliteIndexStore {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

impl IndexStore for SqliteIndexStore {
    fn exists(&self, dir: &Path) -> bool {
        dir.join(INDEX_DB_FILE).is_file()
    }

    fn build(
        &self,
        dir: &Path,
        vocabulary: Vocabulary,
        edges: EdgeStream,
        estimated_edges: u64,
    ) -> Result<Arc<dyn AdjacencyIndex>> {
        let staging = building_dir(dir);
        if staging.exists() {
            warn!(path = %staging.display(), "Removing stale index build");
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        info!(
            vocabulary = %vocabulary,
            estimated_edges,
            path = %dir.display(),
            "Building graph index"
        );
        let result = IndexWriter::create(
            &staging.join(INDEX_DB_FILE),
            vocabulary,
            estimated_edges,
            self.batch_size,
        )
        .and_then(|writer| writer.load(edges));

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(
                    path = %staging.display(),
                    "Could not remove failed index build: {}",
                    cleanup
                );
            }
            return Err(e);
        }

        // The bulk load runs unjournaled; make it durable before publishing
        File::open(staging.join(INDEX_DB_FILE))?.sync_all()?;
        sync_dir(&staging)?;
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        commit_rename(&staging, dir)?;
        self.open(dir, vocabulary)
    }

    fn open(&self, dir: &Path, vocabulary: Vocabulary) -> Result<Arc<dyn AdjacencyIndex>> {
        let index = GraphIndex::open(&dir.join(INDEX_DB_FILE), vocabulary)?;
        Ok(Arc::new(index))
    }
}
