//! CLI command implementations

pub mod build;
pub mod config;
pub mod query;
pub mod status;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use citegraph_config::{CiteGraphConfig, ConfigLoader};
use citegraph_core::archive::RowStream;
use citegraph_core::{
    CacheOptions, CitationArchive, CiteGraphError, DataLayout, MetadataArchive, MetadataRecord,
    TarredCsvMetadata, Vocabulary, VocabularyCache, ZippedCsvCitations,
};

use crate::GlobalOptions;

/// Load configuration: global → local → `--config` file → CLI flags.
pub fn load_config(global: &GlobalOptions) -> Result<CiteGraphConfig> {
    let workspace = std::env::current_dir().context("Failed to get current directory")?;
    let mut loader = ConfigLoader::new();

    loader
        .load_with_file(
            &workspace,
            global.config.as_deref(),
            Some(&global.to_config_overrides()),
        )
        .context("Failed to load configuration")
}

/// Stand-in for an archive the configuration does not name.
///
/// Opening committed indexes never touches the raw archives, so a missing
/// path only becomes an error once a build actually needs it.
struct Unconfigured {
    key: &'static str,
}

impl Unconfigured {
    fn error(&self) -> CiteGraphError {
        CiteGraphError::archive(
            self.key,
            "not configured; set it in config.toml or on the command line",
        )
    }
}

impl MetadataArchive for Unconfigured {
    fn records(&self) -> citegraph_core::Result<RowStream<MetadataRecord>> {
        Err(self.error())
    }
}

impl CitationArchive for Unconfigured {
    fn rows(&self) -> citegraph_core::Result<RowStream<String>> {
        Err(self.error())
    }
}

/// Per-vocabulary size hints from `index.estimated_edges`
pub fn estimated_edges(config: &CiteGraphConfig) -> Result<HashMap<Vocabulary, u64>> {
    config
        .index
        .estimated_edges
        .iter()
        .map(|(name, edges)| {
            let vocabulary: Vocabulary = name
                .parse()
                .with_context(|| format!("Invalid key in index.estimated_edges: {}", name))?;
            Ok((vocabulary, *edges))
        })
        .collect()
}

/// Create the vocabulary cache described by `config`.
pub fn open_cache(config: &CiteGraphConfig, force_rebuild: bool) -> Result<VocabularyCache> {
    let metadata: Arc<dyn MetadataArchive> = match config.archives.metadata {
        Some(ref path) => Arc::new(TarredCsvMetadata::new(path)),
        None => Arc::new(Unconfigured {
            key: "archives.metadata",
        }),
    };
    let citations: Arc<dyn CitationArchive> = if config.archives.citations.is_empty() {
        Arc::new(Unconfigured {
            key: "archives.citations",
        })
    } else {
        Arc::new(ZippedCsvCitations::new(config.archives.citations.clone()))
    };

    let options = CacheOptions {
        force_rebuild,
        estimated_edges: estimated_edges(config)?,
    };

    Ok(VocabularyCache::with_batch_size(
        DataLayout::new(&config.storage.data_dir),
        metadata,
        citations,
        options,
        config.index.batch_size,
    ))
}

/// Parse a vocabulary name for clap
pub fn parse_vocabulary(s: &str) -> Result<Vocabulary, String> {
    s.parse().map_err(|e: CiteGraphError| e.to_string())
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_edges_accepts_aliases() {
        let mut config = CiteGraphConfig::default();
        config
            .index
            .estimated_edges
            .insert("pubmed".to_string(), 7);
        config.index.estimated_edges.insert("doi".to_string(), 9);

        let estimates = estimated_edges(&config).unwrap();
        assert_eq!(estimates.get(&Vocabulary::Pubmed), Some(&7));
        assert_eq!(estimates.get(&Vocabulary::Doi), Some(&9));
        assert_eq!(estimates.get(&Vocabulary::Omid), None);
    }

    #[test]
    fn test_parse_vocabulary() {
        assert_eq!(parse_vocabulary("PMID"), Ok(Vocabulary::Pubmed));
        assert!(parse_vocabulary("arxiv")
            .unwrap_err()
            .contains("not implemented for vocabulary"));
    }

    #[test]
    fn test_unconfigured_archive_fails_on_use() {
        let archive = Unconfigured {
            key: "archives.metadata",
        };
        let err = archive.records().err().unwrap();
        assert!(err.to_string().contains("archives.metadata"));
    }
}
