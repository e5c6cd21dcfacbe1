//! Vocabulary Cache Manager
//!
//! Holds one lazily-initialized graph index per vocabulary for the lifetime
//! of the process. The first access to a vocabulary either opens its
//! committed index or, if none exists, extracts the vocabulary's edge stream
//! and bulk-loads a new one. Concurrent first accesses within the process
//! are single-flight: one caller builds, the others wait for its handle.
//!
//! ```text
//!            open (index exists)
//!  Unbuilt ───────────────────────────────▶ Ready
//!     │                                      ▲
//!     └──▶ Building ── extract + build ──────┘
//! ```
//!
//! A failed initialization leaves the slot Unbuilt; the next access retries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::archive::{CitationArchive, MetadataArchive};
use crate::error::Result;
use crate::extractor::{EdgeExtractor, EdgeSource};
use crate::identifier::{Identifier, Vocabulary};
use crate::index::{AdjacencyIndex, IndexStore, SqliteIndexStore, DEFAULT_BATCH_SIZE};
use crate::layout::DataLayout;
use crate::translator::{IdentifierMap, Translator};

/// Expected edge count for a vocabulary's index, used to size the bulk load
pub fn default_estimated_edges(vocabulary: Vocabulary) -> u64 {
    match vocabulary {
        Vocabulary::Pubmed => 191_000_000,
        Vocabulary::Omid | Vocabulary::Doi => 1_191_000_000,
    }
}

/// Lifecycle of one vocabulary's index within this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Unbuilt,
    Building,
    Ready,
}

/// Knobs for index resolution
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Rebuild maps, edge streams and indexes even if they exist on disk
    pub force_rebuild: bool,
    /// Per-vocabulary overrides of [`default_estimated_edges`]
    pub estimated_edges: HashMap<Vocabulary, u64>,
}

impl CacheOptions {
    pub fn estimated_edges(&self, vocabulary: Vocabulary) -> u64 {
        self.estimated_edges
            .get(&vocabulary)
            .copied()
            .unwrap_or_else(|| default_estimated_edges(vocabulary))
    }
}

#[derive(Default)]
struct Slot {
    index: OnceCell<Arc<dyn AdjacencyIndex>>,
    building: AtomicBool,
}

fn position(vocabulary: Vocabulary) -> usize {
    match vocabulary {
        Vocabulary::Omid => 0,
        Vocabulary::Pubmed => 1,
        Vocabulary::Doi => 2,
    }
}

/// Per-vocabulary, process-lifetime index cache
pub struct VocabularyCache {
    layout: DataLayout,
    translator: Arc<Translator>,
    edges: Arc<dyn EdgeSource>,
    store: Arc<dyn IndexStore>,
    options: CacheOptions,
    slots: [Slot; 3],
}

impl VocabularyCache {
    pub fn new(
        layout: DataLayout,
        translator: Arc<Translator>,
        edges: Arc<dyn EdgeSource>,
        store: Arc<dyn IndexStore>,
        options: CacheOptions,
    ) -> Self {
        Self {
            layout,
            translator,
            edges,
            store,
            options,
            slots: Default::default(),
        }
    }

    /// Wire up the standard pipeline over raw archives with a SQLite store
    pub fn from_archives(
        layout: DataLayout,
        metadata: Arc<dyn MetadataArchive>,
        citations: Arc<dyn CitationArchive>,
        options: CacheOptions,
    ) -> Self {
        Self::with_batch_size(layout, metadata, citations, options, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(
        layout: DataLayout,
        metadata: Arc<dyn MetadataArchive>,
        citations: Arc<dyn CitationArchive>,
        options: CacheOptions,
        batch_size: usize,
    ) -> Self {
        let translator = Arc::new(Translator::new(layout.clone(), metadata));
        let extractor = EdgeExtractor::new(layout.clone(), citations, Arc::clone(&translator));
        Self::new(
            layout,
            translator,
            Arc::new(extractor),
            Arc::new(SqliteIndexStore::new(batch_size)),
            options,
        )
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    fn slot(&self, vocabulary: Vocabulary) -> &Slot {
        &self.slots[position(vocabulary)]
    }

    /// Current lifecycle state of `vocabulary`'s index
    pub fn state(&self, vocabulary: Vocabulary) -> CacheState {
        let slot = self.slot(vocabulary);
        if slot.index.get().is_some() {
            CacheState::Ready
        } else if slot.building.load(Ordering::SeqCst) {
            CacheState::Building
        } else {
            CacheState::Unbuilt
        }
    }

    /// Get the index for `vocabulary`, opening or building it on first use
    pub fn resolve(&self, vocabulary: Vocabulary) -> Result<Arc<dyn AdjacencyIndex>> {
        let slot = self.slot(vocabulary);
        let index = slot
            .index
            .get_or_try_init(|| self.initialize(vocabulary, slot))?;
        Ok(Arc::clone(index))
    }

    fn initialize(&self, vocabulary: Vocabulary, slot: &Slot) -> Result<Arc<dyn AdjacencyIndex>> {
        let dir = self.layout.index_dir(vocabulary);

        if self.store.exists(&dir) && !self.options.force_rebuild {
            let started = Instant::now();
            let index = self.store.open(&dir, vocabulary)?;
            info!(
                vocabulary = %vocabulary,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Opened graph index"
            );
            return Ok(index);
        }

        slot.building.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let result = self
            .edges
            .extract_edges(vocabulary, self.options.force_rebuild)
            .and_then(|edges| {
                self.store.build(
                    &dir,
                    vocabulary,
                    edges,
                    self.options.estimated_edges(vocabulary),
                )
            });
        slot.building.store(false, Ordering::SeqCst);

        if result.is_ok() {
            info!(
                vocabulary = %vocabulary,
                elapsed_s = started.elapsed().as_secs(),
                "Built graph index"
            );
        }
        result
    }

    /// Resolve several vocabularies, building independent ones in parallel
    pub fn warm(&self, vocabularies: &[Vocabulary]) -> Result<()> {
        vocabularies
            .par_iter()
            .map(|vocabulary| self.resolve(*vocabulary).map(|_| ()))
            .collect::<Result<Vec<()>>>()?;
        Ok(())
    }

    /// Identifiers cited by `identifier`, in the same vocabulary
    pub fn outgoing(&self, identifier: &Identifier) -> Result<Vec<Identifier>> {
        let index = self.resolve(identifier.vocabulary)?;
        let targets = index.out_edges(&identifier.local)?;
        Ok(qualify(identifier.vocabulary, targets))
    }

    /// Identifiers citing `identifier`, in the same vocabulary
    pub fn incoming(&self, identifier: &Identifier) -> Result<Vec<Identifier>> {
        let index = self.resolve(identifier.vocabulary)?;
        let sources = index.in_edges(&identifier.local)?;
        Ok(qualify(identifier.vocabulary, sources))
    }

    /// [`outgoing`](Self::outgoing) for a compact URI such as `pmid:33917884`
    pub fn outgoing_str(&self, curie: &str) -> Result<Vec<Identifier>> {
        self.outgoing(&Identifier::parse(curie)?)
    }

    /// [`incoming`](Self::incoming) for a compact URI such as `pmid:33917884`
    pub fn incoming_str(&self, curie: &str) -> Result<Vec<Identifier>> {
        self.incoming(&Identifier::parse(curie)?)
    }

    /// Identifier map for an external vocabulary.
    ///
    /// Shared with index builds of the same vocabulary, so the map is derived
    /// at most once however the two are interleaved.
    pub fn identifier_map(&self, vocabulary: Vocabulary) -> Result<Arc<IdentifierMap>> {
        debug!(vocabulary = %vocabulary, "Resolving identifier map");
        self.translator
            .identifier_map(vocabulary, self.options.force_rebuild)
    }

    /// Convert `identifier` into `target` through its OMID.
    ///
    /// Returns `None` when either leg of the conversion is unmapped.
    pub fn convert(
        &self,
        identifier: &Identifier,
        target: Vocabulary,
    ) -> Result<Option<Identifier>> {
        if identifier.vocabulary == target {
            return Ok(Some(identifier.clone()));
        }

        let native = if identifier.vocabulary.is_native() {
            identifier.local.clone()
        } else {
            let map = self.identifier_map(identifier.vocabulary)?;
            match map.native_for(&identifier.local) {
                Some(native) => native.to_string(),
                None => return Ok(None),
            }
        };

        if target.is_native() {
            return Ok(Some(Identifier::new(target, native)));
        }
        let map = self.identifier_map(target)?;
        Ok(map
            .get(&native)
            .map(|external| Identifier::new(target, external)))
    }
}

fn qualify(vocabulary: Vocabulary, locals: Vec<String>) -> Vec<Identifier> {
    locals
        .into_iter()
        .map(|local| Identifier::new(vocabulary, local))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{VecCitations, VecMetadata};
    use crate::error::CiteGraphError;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> VocabularyCache {
        VocabularyCache::with_batch_size(
            DataLayout::new(dir.path()),
            Arc::new(VecMetadata::from_ids([
                "omid:br/1 pmid:11 doi:10.1/a",
                "omid:br/2 pmid:22",
                "omid:br/3 doi:10.1/c",
            ])),
            Arc::new(VecCitations::new(["oci:1-2", "oci:1-3", "oci:3-2"])),
            CacheOptions::default(),
            2,
        )
    }

    #[test]
    fn test_default_estimates() {
        assert_eq!(default_estimated_edges(Vocabulary::Pubmed), 191_000_000);
        assert_eq!(default_estimated_edges(Vocabulary::Omid), 1_191_000_000);

        let mut options = CacheOptions::default();
        options.estimated_edges.insert(Vocabulary::Doi, 42);
        assert_eq!(options.estimated_edges(Vocabulary::Doi), 42);
        assert_eq!(options.estimated_edges(Vocabulary::Pubmed), 191_000_000);
    }

    #[test]
    fn test_state_transitions_to_ready() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        assert_eq!(cache.state(Vocabulary::Omid), CacheState::Unbuilt);
        cache.resolve(Vocabulary::Omid).unwrap();
        assert_eq!(cache.state(Vocabulary::Omid), CacheState::Ready);
        assert_eq!(cache.state(Vocabulary::Pubmed), CacheState::Unbuilt);
    }

    #[test]
    fn test_resolve_returns_same_handle() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        let first = cache.resolve(Vocabulary::Pubmed).unwrap();
        let second = cache.resolve(Vocabulary::Pubmed).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_queries_per_vocabulary() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        let out = cache.outgoing_str("omid:br/1").unwrap();
        assert_eq!(
            out,
            vec![
                Identifier::new(Vocabulary::Omid, "br/2"),
                Identifier::new(Vocabulary::Omid, "br/3"),
            ]
        );

        let out = cache.outgoing_str("pubmed:11").unwrap();
        assert_eq!(out, vec![Identifier::new(Vocabulary::Pubmed, "22")]);

        let incoming = cache.incoming_str("doi:10.1/c").unwrap();
        assert_eq!(incoming, vec![Identifier::new(Vocabulary::Doi, "10.1/a")]);
    }

    #[test]
    fn test_unknown_identifier_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        assert!(cache.outgoing_str("pmid:39514576").unwrap().is_empty());
        assert!(cache.incoming_str("pmid:39514576").unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_prefix_fails_fast() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        assert!(matches!(
            cache.outgoing_str("arxiv:2101.00001"),
            Err(CiteGraphError::UnsupportedVocabulary(_))
        ));
        assert_eq!(cache.state(Vocabulary::Omid), CacheState::Unbuilt);
    }

    #[test]
    fn test_convert_through_omid() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        let pmid = Identifier::new(Vocabulary::Pubmed, "11");
        assert_eq!(
            cache.convert(&pmid, Vocabulary::Doi).unwrap(),
            Some(Identifier::new(Vocabulary::Doi, "10.1/a"))
        );
        assert_eq!(
            cache.convert(&pmid, Vocabulary::Omid).unwrap(),
            Some(Identifier::new(Vocabulary::Omid, "br/1"))
        );
        assert_eq!(
            cache
                .convert(&Identifier::new(Vocabulary::Pubmed, "22"), Vocabulary::Doi)
                .unwrap(),
            None
        );
    }

    /// Metadata that is slow to open, widening the window in which a build
    /// and a conversion both want the same identifier map
    struct SlowMetadata {
        inner: VecMetadata,
        opened: AtomicUsize,
    }

    impl MetadataArchive for SlowMetadata {
        fn records(&self) -> Result<crate::archive::RowStream<crate::archive::MetadataRecord>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            self.inner.records()
        }
    }

    #[test]
    fn test_concurrent_build_and_convert_share_one_map() {
        let dir = TempDir::new().unwrap();
        let metadata = Arc::new(SlowMetadata {
            inner: VecMetadata::from_ids(["omid:br/1 pmid:11", "omid:br/2 pmid:22"]),
            opened: AtomicUsize::new(0),
        });
        let cache = VocabularyCache::with_batch_size(
            DataLayout::new(dir.path()),
            Arc::clone(&metadata) as Arc<dyn MetadataArchive>,
            Arc::new(VecCitations::new(["oci:1-2"])),
            CacheOptions::default(),
            2,
        );

        let (built, converted) = thread::scope(|s| {
            let build = s.spawn(|| cache.resolve(Vocabulary::Pubmed).map(|_| ()));
            let convert = s.spawn(|| {
                cache.convert(&Identifier::new(Vocabulary::Pubmed, "11"), Vocabulary::Omid)
            });
            (build.join().unwrap(), convert.join().unwrap())
        });

        built.unwrap();
        assert_eq!(
            converted.unwrap(),
            Some(Identifier::new(Vocabulary::Omid, "br/1"))
        );
        assert_eq!(metadata.opened.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.outgoing_str("pmid:11").unwrap(),
            vec![Identifier::new(Vocabulary::Pubmed, "22")]
        );
    }

    #[test]
    fn test_warm_builds_all() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache.warm(&Vocabulary::ALL).unwrap();
        for vocabulary in Vocabulary::ALL {
            assert_eq!(cache.state(vocabulary), CacheState::Ready);
        }
    }
}
