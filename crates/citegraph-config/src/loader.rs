//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.citegraph/config.toml`
//! 2. Local config: `.citegraph/config.toml` (in the working directory)
//! 3. An explicit `--config` file, if given
//! 4. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{
    default_data_dir, ArchiveConfig, CiteGraphConfig, ConfigOverrides, IndexConfig,
    LoggingConfig, StorageConfig, DEFAULT_BATCH_SIZE,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global and local configuration directory name.
const CONFIG_DIR: &str = ".citegraph";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.citegraph`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<CiteGraphConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.citegraph`).
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<CiteGraphConfig, ConfigError> {
        self.load_with_file(workspace_root, None, overrides)
    }

    /// Like [`load`](Self::load), with an explicit config file merged after
    /// the local one.
    pub fn load_with_file(
        &mut self,
        workspace_root: &Path,
        explicit: Option<&Path>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<CiteGraphConfig, ConfigError> {
        let mut config = CiteGraphConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(path) = explicit {
            debug!("Loading explicit config from {:?}", path);
            config = merge_configs(config, load_config_file(path)?);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<CiteGraphConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a workspace.
    pub fn load_local(
        &self,
        workspace_root: &Path,
    ) -> Result<Option<CiteGraphConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Save configuration to the global config file.
    pub fn save_global(&self, config: &CiteGraphConfig) -> Result<(), ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        save_config_file(&global_dir.join(CONFIG_FILE_NAME), config)
    }

    /// Save configuration to the local config file for a workspace.
    pub fn save_local(
        &self,
        workspace_root: &Path,
        config: &CiteGraphConfig,
    ) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(workspace_root), config)
    }

    /// Initialize global configuration.
    ///
    /// Creates `~/.citegraph/config.toml` with default configuration unless
    /// it already exists.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        if !global_dir.exists() {
            std::fs::create_dir_all(global_dir)
                .map_err(|e| ConfigError::create_dir(global_dir, e))?;
        }

        let config_path = global_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &CiteGraphConfig::default())?;
        }

        Ok(config_path)
    }

    /// Forget the cached global configuration.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn load_config_file(path: &Path) -> Result<CiteGraphConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

fn save_config_file(path: &Path, config: &CiteGraphConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// Fields left at their defaults in `overlay` keep the `base` value.
fn merge_configs(base: CiteGraphConfig, overlay: CiteGraphConfig) -> CiteGraphConfig {
    CiteGraphConfig {
        storage: merge_storage(base.storage, overlay.storage),
        archives: merge_archives(base.archives, overlay.archives),
        index: merge_index(base.index, overlay.index),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_storage(base: StorageConfig, overlay: StorageConfig) -> StorageConfig {
    StorageConfig {
        data_dir: if overlay.data_dir != default_data_dir() {
            overlay.data_dir
        } else {
            base.data_dir
        },
    }
}

fn merge_archives(base: ArchiveConfig, overlay: ArchiveConfig) -> ArchiveConfig {
    ArchiveConfig {
        metadata: overlay.metadata.or(base.metadata),
        // The citation list is replaced as a whole, never concatenated
        citations: if overlay.citations.is_empty() {
            base.citations
        } else {
            overlay.citations
        },
    }
}

fn merge_index(base: IndexConfig, overlay: IndexConfig) -> IndexConfig {
    IndexConfig {
        estimated_edges: {
            let mut estimates = base.estimated_edges;
            estimates.extend(overlay.estimated_edges);
            estimates
        },
        batch_size: if overlay.batch_size != DEFAULT_BATCH_SIZE {
            overlay.batch_size
        } else {
            base.batch_size
        },
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: if overlay.level != "info" {
            overlay.level
        } else {
            base.level
        },
        format: overlay.format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogFormat;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_local_config(content: &str, dir: &Path) -> PathBuf {
        let config_dir = dir.join(".citegraph");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn create_global_config(content: &str, dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("config.toml"), content).unwrap();
    }

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config, CiteGraphConfig::default());
    }

    #[test]
    fn test_load_local_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        create_local_config(
            r#"
            [storage]
            data_dir = "/srv/citegraph"

            [archives]
            citations = ["/srv/raw/a.zip"]
            "#,
            temp.path(),
        );

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/citegraph"));
        assert_eq!(config.archives.citations, vec![PathBuf::from("/srv/raw/a.zip")]);
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        create_global_config(
            r#"
            [logging]
            level = "debug"

            [archives]
            metadata = "/global/meta.tar.gz"
            citations = ["/global/a.zip", "/global/b.zip"]

            [index.estimated_edges]
            pubmed = 10
            doi = 20
            "#,
            &global_dir,
        );
        create_local_config(
            r#"
            [archives]
            citations = ["/local/c.zip"]

            [index.estimated_edges]
            doi = 30
            "#,
            temp.path(),
        );

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.archives.citations, vec![PathBuf::from("/local/c.zip")]);
        assert_eq!(
            config.archives.metadata,
            Some(PathBuf::from("/global/meta.tar.gz"))
        );
        assert_eq!(config.index.estimated_edges.get("pubmed"), Some(&10));
        assert_eq!(config.index.estimated_edges.get("doi"), Some(&30));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_explicit_file_and_cli_overrides() {
        let temp = TempDir::new().unwrap();
        let explicit = temp.path().join("custom.toml");
        std::fs::write(
            &explicit,
            r#"
            [index]
            batch_size = 500

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::from("/cli/data")),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };

        let config = loader
            .load_with_file(temp.path(), Some(&explicit), Some(&overrides))
            .unwrap();

        assert_eq!(config.index.batch_size, 500);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.storage.data_dir, PathBuf::from("/cli/data"));
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp = TempDir::new().unwrap();
        create_local_config(
            r#"
            [index]
            batch_size = 0
            "#,
            temp.path(),
        );

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        assert!(matches!(
            loader.load(temp.path(), None),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let temp = TempDir::new().unwrap();
        create_local_config("[storage\ndata_dir = 1", temp.path());

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        assert!(matches!(
            loader.load(temp.path(), None),
            Err(ConfigError::ParseToml { .. })
        ));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let mut config = CiteGraphConfig::default();
        config.archives.metadata = Some(PathBuf::from("/saved/meta.tar.gz"));
        config.logging.level = "warn".to_string();
        loader.save_local(temp.path(), &config).unwrap();

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let loaded = loader.load(temp.path(), None).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_init_global_creates_config_once() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config_path = loader.init_global().unwrap();
        assert!(config_path.exists());
        assert!(config_path.ends_with("global/config.toml"));

        let content = std::fs::read_to_string(&config_path).unwrap();
        let _: CiteGraphConfig = toml::from_str(&content).unwrap();

        std::fs::write(&config_path, "[logging]\nlevel = \"warn\"\n").unwrap();
        loader.init_global().unwrap();
        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("warn"));
    }

    #[test]
    fn test_cache_clearing() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        create_global_config("[logging]\nlevel = \"debug\"\n", &global_dir);

        let mut loader = ConfigLoader::with_global_dir(&global_dir);

        let _ = loader.load_global().unwrap();
        assert!(loader.global_config.is_some());

        loader.clear_cache();
        assert!(loader.global_config.is_none());
    }
}
