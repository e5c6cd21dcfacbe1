//! Identifier Translator
//!
//! Builds the OMID → external identifier map for one vocabulary by scanning
//! the metadata dump once, and persists it as a checkpoint artifact:
//!
//! ```text
//! omid            pmid
//! br/06180450607  33917884
//! ...
//! ```
//!
//! Later runs read the artifact back instead of rescanning.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::archive::{MetadataArchive, MetadataRecord, RowStream};
use crate::checkpoint::{artifact_exists, Persisting, TsvReader, TsvWriter};
use crate::error::{CiteGraphError, Result};
use crate::identifier::Vocabulary;
use crate::layout::DataLayout;
use crate::scan::ScanStats;

/// Split a metadata `id` field into prefix → local value.
///
/// Tokens without a local value are ignored; a later token with the same
/// prefix overwrites an earlier one.
pub fn parse_bundle(id_field: &str) -> HashMap<&str, &str> {
    let mut references = HashMap::new();
    for curie in id_field.split_whitespace() {
        let (prefix, local) = curie.split_once(':').unwrap_or((curie, ""));
        if local.is_empty() {
            continue;
        }
        references.insert(prefix, local);
    }
    references
}

/// Bidirectional OMID ↔ external identifier map for one vocabulary.
///
/// Both directions are last-write-wins. Injectivity is assumed, not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierMap {
    vocabulary: Vocabulary,
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl IdentifierMap {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    pub fn vocabulary(&self) -> Vocabulary {
        self.vocabulary
    }

    pub fn insert(&mut self, native: String, external: String) {
        if let Some(previous) = self.forward.insert(native.clone(), external.clone()) {
            if previous != external && self.reverse.get(&previous) == Some(&native) {
                self.reverse.remove(&previous);
            }
        }
        self.reverse.insert(external, native);
    }

    /// External identifier for an OMID
    pub fn get(&self, native: &str) -> Option<&str> {
        self.forward.get(native).map(String::as_str)
    }

    /// OMID for an external identifier
    pub fn native_for(&self, external: &str) -> Option<&str> {
        self.reverse.get(external).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(n, e)| (n.as_str(), e.as_str()))
    }
}

/// Pure producer of (OMID, external) pairs from metadata records
pub struct Mappings {
    records: RowStream<MetadataRecord>,
    vocabulary: Vocabulary,
    stats: ScanStats,
    finished: bool,
}

impl Mappings {
    pub fn new(records: RowStream<MetadataRecord>, vocabulary: Vocabulary) -> Self {
        Self {
            records,
            vocabulary,
            stats: ScanStats::default(),
            finished: false,
        }
    }
}

impl Iterator for Mappings {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    self.stats.log_summary("translate", self.vocabulary);
                    return None;
                }
            };
            self.stats.tick("translate", self.vocabulary);

            let references = parse_bundle(&record.id);
            let Some(native) = references.get(Vocabulary::Omid.prefix()) else {
                warn!(curies = %record.id, "Skipping metadata record without OMID");
                self.stats.malformed += 1;
                continue;
            };
            match references.get(self.vocabulary.prefix()) {
                Some(external) => {
                    self.stats.emitted += 1;
                    return Some(Ok((native.to_string(), external.to_string())));
                }
                None => self.stats.dropped += 1,
            }
        }
    }
}

/// Builds and loads identifier maps.
///
/// [`identifier_map`](Self::identifier_map) derives each vocabulary's map at
/// most once per translator, so the map artifact has a single writer even
/// when index builds and conversions ask for it concurrently.
pub struct Translator {
    layout: DataLayout,
    metadata: Arc<dyn MetadataArchive>,
    maps: [OnceCell<Arc<IdentifierMap>>; 3],
}

fn slot(vocabulary: Vocabulary) -> usize {
    match vocabulary {
        Vocabulary::Omid => 0,
        Vocabulary::Pubmed => 1,
        Vocabulary::Doi => 2,
    }
}

impl Translator {
    pub fn new(layout: DataLayout, metadata: Arc<dyn MetadataArchive>) -> Self {
        Self {
            layout,
            metadata,
            maps: Default::default(),
        }
    }

    /// Shared identifier map for `vocabulary`, derived once.
    ///
    /// The first caller loads or builds the map per `force_rebuild`;
    /// concurrent callers wait for it and later callers get the same map.
    /// A failed derivation is not memoized.
    pub fn identifier_map(
        &self,
        vocabulary: Vocabulary,
        force_rebuild: bool,
    ) -> Result<Arc<IdentifierMap>> {
        let map = self.maps[slot(vocabulary)].get_or_try_init(|| {
            self.translate_vocabulary(vocabulary, force_rebuild)
                .map(Arc::new)
        })?;
        Ok(Arc::clone(map))
    }

    /// Get the identifier map for `vocabulary`, building it if needed.
    ///
    /// An existing artifact is loaded unless `force_rebuild` is set. The
    /// native vocabulary has no map and is rejected.
    pub fn translate_vocabulary(
        &self,
        vocabulary: Vocabulary,
        force_rebuild: bool,
    ) -> Result<IdentifierMap> {
        let path = self.layout.map_path(vocabulary).ok_or_else(|| {
            CiteGraphError::UnsupportedVocabulary(format!(
                "{} (native vocabulary has no identifier map)",
                vocabulary
            ))
        })?;

        if artifact_exists(&path) && !force_rebuild {
            debug!(vocabulary = %vocabulary, path = %path.display(), "Loading identifier map");
            let mut reader = TsvReader::open(&path)?;
            let (native_label, external_label) = reader.read_header()?;
            if native_label != Vocabulary::Omid.prefix() || external_label != vocabulary.prefix() {
                return Err(CiteGraphError::corrupt(
                    &path,
                    format!(
                        "unexpected header ({}, {}), expected ({}, {})",
                        native_label,
                        external_label,
                        Vocabulary::Omid.prefix(),
                        vocabulary.prefix()
                    ),
                ));
            }
            return collect_map(vocabulary, reader);
        }

        info!(vocabulary = %vocabulary, path = %path.display(), "Building identifier map");
        let mut writer = TsvWriter::create(&path)?;
        writer.write_row(Vocabulary::Omid.prefix(), vocabulary.prefix())?;
        let mappings = self.mappings(vocabulary)?;
        let map = collect_map(vocabulary, Persisting::new(mappings, writer))?;
        info!(vocabulary = %vocabulary, entries = map.len(), "Identifier map ready");
        Ok(map)
    }

    /// Stream (OMID, external) pairs straight from the metadata dump
    pub fn mappings(&self, vocabulary: Vocabulary) -> Result<Mappings> {
        Ok(Mappings::new(self.metadata.records()?, vocabulary))
    }
}

fn collect_map(
    vocabulary: Vocabulary,
    pairs: impl Iterator<Item = Result<(String, String)>>,
) -> Result<IdentifierMap> {
    let mut map = IdentifierMap::new(vocabulary);
    for pair in pairs {
        let (native, external) = pair?;
        map.insert(native, external);
    }
    Ok(map)
}
