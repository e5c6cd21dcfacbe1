//! CiteGraph Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.citegraph/config.toml`
//! - Local config: `.citegraph/config.toml` (in the working directory)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.
//!
//! # Example TOML
//!
//! ```toml
//! [storage]
//! data_dir = "/srv/citegraph"
//!
//! [archives]
//! metadata = "/srv/raw/meta.tar.gz"
//! citations = ["/srv/raw/citations-1.zip", "/srv/raw/citations-2.zip"]
//!
//! [index]
//! batch_size = 100000
//!
//! [index.estimated_edges]
//! pubmed = 191000000
//! ```

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default edges per SQLite insert transaction
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Vocabulary names accepted as keys of `index.estimated_edges`
pub const VOCABULARY_KEYS: &[&str] = &["omid", "pmid", "pubmed", "doi"];

/// Root configuration for CiteGraph.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CiteGraphConfig {
    /// Where derived artifacts live
    pub storage: StorageConfig,

    /// Raw dump locations
    pub archives: ArchiveConfig,

    /// Index build tuning
    pub index: IndexConfig,

    pub logging: LoggingConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for identifier maps, edge streams and indexes
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// `~/.data/citegraph`, or a relative `.data/citegraph` without a home directory
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".data")
        .join("citegraph")
}

/// Raw archive locations.
///
/// Acquisition happens elsewhere; these are plain local paths.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Metadata dump (tar.gz of CSV files)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PathBuf>,

    /// Citation dump (one or more zips of CSV files), read in order
    pub citations: Vec<PathBuf>,
}

/// Index build configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Expected edge count per vocabulary, keyed by vocabulary name.
    ///
    /// Only sizes the bulk load; vocabularies not listed use built-in estimates.
    pub estimated_edges: BTreeMap<String, u64>,

    /// Edges per insert transaction
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            estimated_edges: BTreeMap::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override data directory
    pub data_dir: Option<PathBuf>,
    /// Override metadata archive
    pub metadata_archive: Option<PathBuf>,
    /// Override citation archives (replaces the configured list)
    pub citation_archives: Option<Vec<PathBuf>>,
    /// Override log level
    pub log_level: Option<String>,
    /// Override insert batch size
    pub batch_size: Option<usize>,
}

impl CiteGraphConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref dir) = overrides.data_dir {
            self.storage.data_dir = dir.clone();
        }
        if let Some(ref metadata) = overrides.metadata_archive {
            self.archives.metadata = Some(metadata.clone());
        }
        if let Some(ref citations) = overrides.citation_archives {
            self.archives.citations = citations.clone();
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(batch_size) = overrides.batch_size {
            self.index.batch_size = batch_size;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.batch_size == 0 {
            return Err(ConfigError::invalid_value(
                "index.batch_size",
                "must be greater than zero",
            ));
        }
        for key in self.index.estimated_edges.keys() {
            if !VOCABULARY_KEYS.contains(&key.to_lowercase().as_str()) {
                return Err(ConfigError::invalid_value(
                    format!("index.estimated_edges.{}", key),
                    format!(
                        "unknown vocabulary '{}'. Valid values: {}",
                        key,
                        VOCABULARY_KEYS.join(", ")
                    ),
                ));
            }
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.data_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
