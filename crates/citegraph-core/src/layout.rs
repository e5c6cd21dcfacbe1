//! On-disk layout of derived artifacts
//!
//! ```text
//! <root>/
//! ├── omid_to_pmid.tsv.gz      (identifier map, external vocabularies only)
//! ├── pmid_citations.tsv.gz    (edge stream artifact)
//! └── database-pmid/           (graph index directory)
//! ```

use std::path::{Path, PathBuf};

use crate::identifier::Vocabulary;

/// Fixed per-vocabulary artifact locations under a data root
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identifier map artifact, or `None` for the native vocabulary
    pub fn map_path(&self, vocabulary: Vocabulary) -> Option<PathBuf> {
        if vocabulary.is_native() {
            return None;
        }
        Some(self.root.join(format!(
            "{}_to_{}.tsv.gz",
            Vocabulary::Omid.prefix(),
            vocabulary.prefix()
        )))
    }

    /// Edge stream artifact
    pub fn edges_path(&self, vocabulary: Vocabulary) -> PathBuf {
        self.root.join(format!("{}_citations.tsv.gz", vocabulary.prefix()))
    }

    /// Graph index directory
    pub fn index_dir(&self, vocabulary: Vocabulary) -> PathBuf {
        self.root.join(format!("database-{}", vocabulary.prefix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = DataLayout::new("/data");
        assert_eq!(layout.map_path(Vocabulary::Omid), None);
        assert_eq!(
            layout.map_path(Vocabulary::Pubmed),
            Some(PathBuf::from("/data/omid_to_pmid.tsv.gz"))
        );
        assert_eq!(
            layout.edges_path(Vocabulary::Doi),
            PathBuf::from("/data/doi_citations.tsv.gz")
        );
        assert_eq!(
            layout.index_dir(Vocabulary::Omid),
            PathBuf::from("/data/database-omid")
        );
    }
}
