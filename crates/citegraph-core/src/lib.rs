//! CiteGraph Core - Citation graph ingestion and adjacency indexing
//!
//! This crate turns the raw OpenCitations dumps into per-vocabulary citation
//! graphs that answer "what does X cite" and "what cites X":
//! - Streaming readers over the metadata tar.gz and citation zip archives
//! - Identifier translation from OMIDs into PubMed IDs and DOIs
//! - Edge extraction with crash-safe TSV checkpoints
//! - SQLite-backed bidirectional adjacency indexes
//! - A per-vocabulary cache that builds indexes once and reuses them

pub mod archive;
pub mod cache;
pub mod checkpoint;
pub mod error;
pub mod extractor;
pub mod identifier;
pub mod index;
pub mod layout;
pub mod scan;
pub mod translator;

// Re-exports for convenience
pub use error::{CiteGraphError, Result};
pub use identifier::{Edge, Identifier, Vocabulary};
pub use layout::DataLayout;

// Archive re-exports
pub use archive::{
    CitationArchive, MetadataArchive, MetadataRecord, TarredCsvMetadata, VecCitations,
    VecMetadata, ZippedCsvCitations,
};

// Pipeline re-exports
pub use extractor::{parse_citation, EdgeExtractor, EdgeSource, EdgeStream};
pub use translator::{parse_bundle, IdentifierMap, Translator};

// Index re-exports
pub use index::{
    AdjacencyIndex, GraphIndex, IndexStats, IndexStore, SqliteIndexStore, DEFAULT_BATCH_SIZE,
};

// Cache re-exports
pub use cache::{default_estimated_edges, CacheOptions, CacheState, VocabularyCache};
