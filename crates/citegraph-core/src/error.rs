//! Error types for the ingestion and indexing pipeline.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while building or querying citation graphs
#[derive(Debug, Error)]
pub enum CiteGraphError {
    #[error("citation lookup not implemented for vocabulary: {0}")]
    UnsupportedVocabulary(String),

    #[error("corrupt artifact '{path}': {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("unreadable archive '{path}': {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl CiteGraphError {
    /// Create a new CorruptArtifact error.
    pub fn corrupt(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a new Archive error.
    pub fn archive(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Archive {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, CiteGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CiteGraphError::UnsupportedVocabulary("arxiv".to_string());
        assert_eq!(
            err.to_string(),
            "citation lookup not implemented for vocabulary: arxiv"
        );

        let err = CiteGraphError::corrupt("/data/omid_to_pmid.tsv.gz", "missing header");
        assert!(err.to_string().contains("omid_to_pmid.tsv.gz"));
        assert!(err.to_string().contains("missing header"));
    }
}
