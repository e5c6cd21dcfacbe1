//! SQLite Schema Definitions for Graph Indexes
//!
//! Each vocabulary's index is a self-contained SQLite database holding the
//! deduplicated edge list for that vocabulary.

/// Schema version for index databases
pub const INDEX_SCHEMA_VERSION: &str = "1.0";

/// Database file name inside an index directory
pub const INDEX_DB_FILE: &str = "graph.db";

/// SQL to create the edges table
///
/// Rows keep the edge stream's order through their rowid; queries return
/// neighbours in that order.
pub const SCHEMA_CREATE_EDGES: &str = r#"
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY,
    source TEXT NOT NULL,
    target TEXT NOT NULL
)
"#;

/// SQL to create the metadata table
pub const SCHEMA_CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS index_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

/// Outgoing-direction index, created after the bulk load.
///
/// Covers (source, target) so the deduplication pass below is a series of
/// index seeks rather than a sort of the whole edge table.
pub const SCHEMA_CREATE_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source, target, id)
"#;

/// Drop repeated (source, target) pairs, keeping the first occurrence
pub const SQL_DEDUPLICATE_EDGES: &str = r#"
DELETE FROM edges WHERE EXISTS (
    SELECT 1 FROM edges AS earlier
    WHERE earlier.source = edges.source
      AND earlier.target = edges.target
      AND earlier.id < edges.id
)
"#;

/// Incoming-direction index, created once duplicates are gone
pub const SCHEMA_CREATE_TARGET_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target)
"#;
