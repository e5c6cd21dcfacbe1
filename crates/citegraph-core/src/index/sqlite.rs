//! SQLite-backed adjacency index
//!
//! A [`GraphIndex`] wraps one read-only connection to a finished index
//! database. [`IndexWriter`] does the one-shot bulk load into a fresh
//! database file.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Result as SqliteResult};
use tracing::{debug, info};

use super::schema::{
    INDEX_SCHEMA_VERSION, SCHEMA_CREATE_EDGES, SCHEMA_CREATE_METADATA,
    SCHEMA_CREATE_SOURCE_INDEX, SCHEMA_CREATE_TARGET_INDEX, SQL_DEDUPLICATE_EDGES,
};
use super::{AdjacencyIndex, IndexStats};
use crate::error::{CiteGraphError, Result};
use crate::identifier::{Edge, Vocabulary};
use crate::scan::PROGRESS_LOG_INTERVAL;

/// Smallest page cache used during bulk loads (KB)
const MIN_BUILD_CACHE_KB: u64 = 64 * 1024;

/// Largest page cache used during bulk loads (KB)
const MAX_BUILD_CACHE_KB: u64 = 1024 * 1024;

/// Page cache for read connections (KB)
const READ_CACHE_KB: i64 = 64 * 1024;

/// Memory-mapped I/O for read connections
const READ_MMAP_BYTES: i64 = 268_435_456;

/// Page cache size for a bulk load, scaled by the expected edge count.
///
/// Only affects speed; any hint produces the same database.
fn build_cache_kb(estimated_edges: u64) -> i64 {
    (estimated_edges / 1000).clamp(MIN_BUILD_CACHE_KB, MAX_BUILD_CACHE_KB) as i64
}

/// Bulk loader for a new index database
pub struct IndexWriter {
    conn: Connection,
    vocabulary: Vocabulary,
    batch_size: usize,
}

impl IndexWriter {
    /// Create a new, empty index database at `path`
    pub fn create(
        path: &Path,
        vocabulary: Vocabulary,
        estimated_edges: u64,
        batch_size: usize,
    ) -> Result<Self> {
        let conn = Connection::open(path)?;
        // The database is private until it is synced and renamed into place
        conn.pragma_update(None, "journal_mode", "OFF")?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        // Index sorts over the full edge table must spill to disk
        conn.pragma_update(None, "temp_store", "FILE")?;
        conn.pragma_update(None, "cache_size", -build_cache_kb(estimated_edges))?;

        conn.execute(SCHEMA_CREATE_EDGES, [])?;
        conn.execute(SCHEMA_CREATE_METADATA, [])?;

        Ok(Self {
            conn,
            vocabulary,
            batch_size: batch_size.max(1),
        })
    }

    /// Insert every edge of `edges` in batched transactions, then deduplicate,
    /// index, and record metadata. Returns the final edge count.
    pub fn load(self, edges: impl Iterator<Item = Result<Edge>>) -> Result<u64> {
        let mut inserted: u64 = 0;
        let mut batch = Vec::with_capacity(self.batch_size);

        for edge in edges {
            batch.push(edge?);
            if batch.len() >= self.batch_size {
                inserted += self.insert_batch(&batch)?;
                batch.clear();
                if inserted % PROGRESS_LOG_INTERVAL < self.batch_size as u64 {
                    info!(vocabulary = %self.vocabulary, edges = inserted, "Index load progress");
                }
            }
        }
        if !batch.is_empty() {
            inserted += self.insert_batch(&batch)?;
        }

        debug!(vocabulary = %self.vocabulary, inserted, "Indexing outgoing edges");
        self.conn.execute(SCHEMA_CREATE_SOURCE_INDEX, [])?;
        debug!(vocabulary = %self.vocabulary, "Deduplicating edges");
        let removed = self.conn.execute(SQL_DEDUPLICATE_EDGES, [])?;
        debug!(vocabulary = %self.vocabulary, "Indexing incoming edges");
        self.conn.execute(SCHEMA_CREATE_TARGET_INDEX, [])?;

        let edge_count = inserted - removed as u64;
        self.set_metadata("schema_version", INDEX_SCHEMA_VERSION)?;
        self.set_metadata("vocabulary", self.vocabulary.prefix())?;
        self.set_metadata("edge_count", &edge_count.to_string())?;

        info!(
            vocabulary = %self.vocabulary,
            edges = edge_count,
            duplicates = removed,
            "Index load complete"
        );
        Ok(edge_count)
    }

    fn insert_batch(&self, batch: &[Edge]) -> Result<u64> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached("INSERT INTO edges (source, target) VALUES (?1, ?2)")?;
            for edge in batch {
                stmt.execute(params![edge.source, edge.target])?;
            }
        }
        tx.commit()?;
        Ok(batch.len() as u64)
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO index_metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Read-only handle on a finished index database
pub struct GraphIndex {
    conn: Mutex<Connection>,
    vocabulary: Vocabulary,
    path: PathBuf,
    edge_count: u64,
}

impl GraphIndex {
    /// Open a finished index database, validating its metadata
    pub fn open(path: &Path, vocabulary: Vocabulary) -> Result<Self> {
        if !path.is_file() {
            return Err(CiteGraphError::corrupt(path, "index database missing"));
        }
        let corrupt = |e: rusqlite::Error| CiteGraphError::corrupt(path, e.to_string());
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(corrupt)?;
        Self::configure_connection(&conn).map_err(corrupt)?;

        let version = get_metadata(&conn, "schema_version").map_err(corrupt)?;
        if version.as_deref() != Some(INDEX_SCHEMA_VERSION) {
            return Err(CiteGraphError::corrupt(
                path,
                format!(
                    "schema version mismatch: expected {}, found {}",
                    INDEX_SCHEMA_VERSION,
                    version.as_deref().unwrap_or("none")
                ),
            ));
        }

        let stored = get_metadata(&conn, "vocabulary").map_err(corrupt)?;
        if stored.as_deref() != Some(vocabulary.prefix()) {
            return Err(CiteGraphError::corrupt(
                path,
                format!(
                    "index belongs to vocabulary {}, expected {}",
                    stored.as_deref().unwrap_or("none"),
                    vocabulary
                ),
            ));
        }

        let edge_count = get_metadata(&conn, "edge_count")
            .map_err(corrupt)?
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| CiteGraphError::corrupt(path, "missing edge count"))?;

        Ok(Self {
            conn: Mutex::new(conn),
            vocabulary,
            path: path.to_path_buf(),
            edge_count,
        })
    }

    fn configure_connection(conn: &Connection) -> SqliteResult<()> {
        conn.pragma_update(None, "cache_size", -READ_CACHE_KB)?;
        conn.pragma_update(None, "mmap_size", READ_MMAP_BYTES)?;
        conn.pragma_update(None, "query_only", "ON")?;
        Ok(())
    }

    fn neighbours(&self, sql: &str, local: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let values = stmt
            .query_map([local], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(values)
    }
}

impl AdjacencyIndex for GraphIndex {
    fn vocabulary(&self) -> Vocabulary {
        self.vocabulary
    }

    fn out_edges(&self, local: &str) -> Result<Vec<String>> {
        self.neighbours("SELECT target FROM edges WHERE source = ?1 ORDER BY id", local)
    }

    fn in_edges(&self, local: &str) -> Result<Vec<String>> {
        self.neighbours("SELECT source FROM edges WHERE target = ?1 ORDER BY id", local)
    }

    fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            vocabulary: self.vocabulary,
            edge_count: self.edge_count,
            schema_version: INDEX_SCHEMA_VERSION.to_string(),
            path: self.path.clone(),
        })
    }
}

fn get_metadata(conn: &Connection, key: &str) -> SqliteResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM index_metadata WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build(dir: &TempDir, edges: Vec<Edge>, batch_size: usize) -> GraphIndex {
        let path = dir.path().join("graph.db");
        IndexWriter::create(&path, Vocabulary::Pubmed, 10, batch_size)
            .unwrap()
            .load(edges.into_iter().map(Ok))
            .unwrap();
        GraphIndex::open(&path, Vocabulary::Pubmed).unwrap()
    }

    #[test]
    fn test_build_cache_is_clamped() {
        assert_eq!(build_cache_kb(0), MIN_BUILD_CACHE_KB as i64);
        assert_eq!(build_cache_kb(u64::MAX), MAX_BUILD_CACHE_KB as i64);
        assert_eq!(build_cache_kb(191_000_000_000), MAX_BUILD_CACHE_KB as i64);
    }

    #[test]
    fn test_neighbours_follow_stream_order() {
        let dir = TempDir::new().unwrap();
        let index = build(
            &dir,
            vec![
                Edge::new("1", "9"),
                Edge::new("1", "3"),
                Edge::new("2", "3"),
                Edge::new("1", "5"),
            ],
            2,
        );

        assert_eq!(index.out_edges("1").unwrap(), vec!["9", "3", "5"]);
        assert_eq!(index.in_edges("3").unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn test_duplicates_are_removed() {
        let dir = TempDir::new().unwrap();
        let index = build(
            &dir,
            vec![
                Edge::new("1", "2"),
                Edge::new("1", "2"),
                Edge::new("2", "1"),
                Edge::new("1", "2"),
            ],
            100,
        );

        assert_eq!(index.out_edges("1").unwrap(), vec!["2"]);
        assert_eq!(index.stats().unwrap().edge_count, 2);
    }

    #[test]
    fn test_build_keeps_temp_data_on_disk() {
        let dir = TempDir::new().unwrap();
        let writer =
            IndexWriter::create(&dir.path().join("graph.db"), Vocabulary::Omid, 10, 10).unwrap();
        let temp_store: i64 = writer
            .conn
            .query_row("PRAGMA temp_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(temp_store, 1);
    }

    #[test]
    fn test_deduplication_seeks_the_source_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.db");
        build(&dir, vec![Edge::new("1", "2"), Edge::new("1", "2")], 10);

        let conn = Connection::open(&path).unwrap();
        let mut stmt = conn
            .prepare(&format!("EXPLAIN QUERY PLAN {}", SQL_DEDUPLICATE_EDGES))
            .unwrap();
        let plan: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(3))
            .unwrap()
            .collect::<SqliteResult<_>>()
            .unwrap();

        assert!(plan.iter().any(|step| step.contains("idx_edges_source")), "{:?}", plan);
        assert!(!plan.iter().any(|step| step.contains("TEMP B-TREE")), "{:?}", plan);
    }

    #[test]
    fn test_wrong_vocabulary_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.db");
        IndexWriter::create(&path, Vocabulary::Doi, 0, 10)
            .unwrap()
            .load(std::iter::empty())
            .unwrap();

        assert!(matches!(
            GraphIndex::open(&path, Vocabulary::Pubmed),
            Err(CiteGraphError::CorruptArtifact { .. })
        ));
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.db");
        std::fs::write(&path, b"definitely not sqlite, just some bytes padding it out").unwrap();

        assert!(matches!(
            GraphIndex::open(&path, Vocabulary::Pubmed),
            Err(CiteGraphError::CorruptArtifact { .. })
        ));
    }
}
