//! Identifier vocabularies, compact URIs and citation edges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CiteGraphError;

/// Identifier vocabularies with a citation index.
///
/// `Omid` is the graph's own identifier space; every other vocabulary is
/// reached by translating OMIDs through an identifier map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vocabulary {
    /// OpenCitations Meta identifier (native)
    Omid,
    /// PubMed identifier
    Pubmed,
    /// Digital Object Identifier
    Doi,
}

impl Vocabulary {
    /// All vocabularies, native first
    pub const ALL: [Vocabulary; 3] = [Vocabulary::Omid, Vocabulary::Pubmed, Vocabulary::Doi];

    /// Prefix used in compact URIs and in artifact file names
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Omid => "omid",
            Self::Pubmed => "pmid",
            Self::Doi => "doi",
        }
    }

    /// Whether this is the graph's native vocabulary
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Omid)
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for Vocabulary {
    type Err = CiteGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "omid" => Ok(Self::Omid),
            "pmid" | "pubmed" => Ok(Self::Pubmed),
            "doi" => Ok(Self::Doi),
            _ => Err(CiteGraphError::UnsupportedVocabulary(s.to_string())),
        }
    }
}

/// A local identifier qualified by its vocabulary.
///
/// Equality is exact on both fields; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub vocabulary: Vocabulary,
    pub local: String,
}

impl Identifier {
    pub fn new(vocabulary: Vocabulary, local: impl Into<String>) -> Self {
        Self {
            vocabulary,
            local: local.into(),
        }
    }

    /// Parse a compact URI such as `pubmed:33917884` or `omid:br/061202127149`.
    ///
    /// Only the first colon separates prefix from local value, so DOIs and
    /// OMIDs containing further punctuation survive intact.
    pub fn parse(curie: &str) -> Result<Self, CiteGraphError> {
        let (prefix, local) = curie
            .split_once(':')
            .ok_or_else(|| CiteGraphError::InvalidIdentifier(curie.to_string()))?;
        if local.is_empty() {
            return Err(CiteGraphError::InvalidIdentifier(curie.to_string()));
        }
        Ok(Self::new(prefix.parse()?, local))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vocabulary.prefix(), self.local)
    }
}

impl FromStr for Identifier {
    type Err = CiteGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A directed citation: `source` cites `target`.
///
/// Both endpoints are local values within a single vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl From<(String, String)> for Edge {
    fn from((source, target): (String, String)) -> Self {
        Self { source, target }
    }
}
