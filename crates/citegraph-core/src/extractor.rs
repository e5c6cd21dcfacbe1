//! Edge Extractor
//!
//! Turns raw citation rows (`oci:LEFT-RIGHT`) into per-vocabulary edge
//! streams. Native edges are emitted as `br/LEFT → br/RIGHT`; external
//! vocabularies translate both endpoints through the identifier map and drop
//! edges with an unmapped endpoint. Drops are final for the artifact that is
//! written, even if the map is extended later.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::{CitationArchive, RowStream};
use crate::checkpoint::{artifact_exists, Persisting, TsvReader, TsvWriter};
use crate::error::Result;
use crate::identifier::{Edge, Vocabulary};
use crate::layout::DataLayout;
use crate::scan::ScanStats;
use crate::translator::{IdentifierMap, Translator};

/// Literal prefix on citation identifiers
const CITATION_PREFIX: &str = "oci:";

/// Prefix turning a citation half into an OMID local value
const BIBLIOGRAPHIC_RESOURCE_PREFIX: &str = "br/";

/// Ordered, fallible stream of edges
pub type EdgeStream = Box<dyn Iterator<Item = Result<Edge>> + Send>;

/// Split a citation row into its two native halves.
///
/// Returns `None` when the row has no hyphen or either half is empty.
pub fn parse_citation(row: &str) -> Option<(&str, &str)> {
    let body = row.strip_prefix(CITATION_PREFIX).unwrap_or(row);
    let (left, right) = body.split_once('-')?;
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

/// OMID local value for one half of a citation identifier
pub fn native_local(half: &str) -> String {
    format!("{}{}", BIBLIOGRAPHIC_RESOURCE_PREFIX, half)
}

/// Source of per-vocabulary edge streams
pub trait EdgeSource: Send + Sync {
    fn extract_edges(&self, vocabulary: Vocabulary, force_rebuild: bool) -> Result<EdgeStream>;
}

/// Pure producer of native edges from raw citation rows
pub struct NativeEdges {
    rows: RowStream<String>,
    vocabulary: Vocabulary,
    stats: ScanStats,
    finished: bool,
}

impl NativeEdges {
    /// `vocabulary` labels progress logs with the build this producer feeds
    pub fn new(rows: RowStream<String>, vocabulary: Vocabulary) -> Self {
        Self {
            rows,
            vocabulary,
            stats: ScanStats::default(),
            finished: false,
        }
    }
}

impl Iterator for NativeEdges {
    type Item = Result<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let row = match self.rows.next() {
                Some(Ok(row)) => row,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    self.stats.log_summary("extract", self.vocabulary);
                    return None;
                }
            };
            self.stats.tick("extract", self.vocabulary);

            match parse_citation(&row) {
                Some((left, right)) => {
                    self.stats.emitted += 1;
                    return Some(Ok(Edge::new(native_local(left), native_local(right))));
                }
                None => {
                    warn!(row = %row, "Skipping malformed citation row");
                    self.stats.malformed += 1;
                }
            }
        }
    }
}

/// Adapter translating native edges into an external vocabulary
pub struct TranslatedEdges<I> {
    native: I,
    map: Arc<IdentifierMap>,
    stats: ScanStats,
    finished: bool,
}

impl<I> TranslatedEdges<I>
where
    I: Iterator<Item = Result<Edge>>,
{
    pub fn new(native: I, map: Arc<IdentifierMap>) -> Self {
        Self {
            native,
            map,
            stats: ScanStats::default(),
            finished: false,
        }
    }
}

impl<I> Iterator for TranslatedEdges<I>
where
    I: Iterator<Item = Result<Edge>>,
{
    type Item = Result<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let edge = match self.native.next() {
                Some(Ok(edge)) => edge,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    self.stats.log_summary("translate-edges", self.map.vocabulary());
                    return None;
                }
            };
            self.stats.read += 1;

            match (self.map.get(&edge.source), self.map.get(&edge.target)) {
                (Some(source), Some(target)) => {
                    self.stats.emitted += 1;
                    return Some(Ok(Edge::new(source, target)));
                }
                _ => self.stats.dropped += 1,
            }
        }
    }
}

/// Derives and caches per-vocabulary edge stream artifacts
pub struct EdgeExtractor {
    layout: DataLayout,
    citations: Arc<dyn CitationArchive>,
    translator: Arc<Translator>,
}

impl EdgeExtractor {
    pub fn new(
        layout: DataLayout,
        citations: Arc<dyn CitationArchive>,
        translator: Arc<Translator>,
    ) -> Self {
        Self {
            layout,
            citations,
            translator,
        }
    }

    /// Native edges straight from the raw citation dump, without persistence
    pub fn native_edges(&self, vocabulary: Vocabulary) -> Result<NativeEdges> {
        Ok(NativeEdges::new(self.citations.rows()?, vocabulary))
    }
}

impl EdgeSource for EdgeExtractor {
    /// Stream the edges of `vocabulary`.
    ///
    /// A completed artifact is replayed in its written order. Otherwise the
    /// edges are derived from the raw dump and persisted as they stream; the
    /// artifact is committed only once the stream has been fully consumed.
    fn extract_edges(&self, vocabulary: Vocabulary, force_rebuild: bool) -> Result<EdgeStream> {
        let path = self.layout.edges_path(vocabulary);

        if artifact_exists(&path) && !force_rebuild {
            debug!(vocabulary = %vocabulary, path = %path.display(), "Replaying edge artifact");
            return Ok(Box::new(TsvReader::open(&path)?.records::<Edge>()));
        }

        info!(vocabulary = %vocabulary, path = %path.display(), "Extracting edges");
        let producer: EdgeStream = if vocabulary.is_native() {
            Box::new(self.native_edges(vocabulary)?)
        } else {
            let map = self.translator.identifier_map(vocabulary, force_rebuild)?;
            Box::new(TranslatedEdges::new(self.native_edges(vocabulary)?, map))
        };
        let writer = TsvWriter::create(&path)?;
        Ok(Box::new(Persisting::new(producer, writer)))
    }
}
