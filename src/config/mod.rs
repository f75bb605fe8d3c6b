//! Configuration management for deplumi

pub mod schema;

pub use schema::Config;

use crate::error::{DeplumiError, DeplumiResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deplumi")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deplumi")
    }

    /// Get the build journal path
    pub fn journal_path() -> PathBuf {
        Self::state_dir().join("journal.log")
    }

    /// Get the default cache root (build directories and archives)
    pub fn default_cache_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("deplumi")
    }

    /// Resolve the cache root for a configuration
    pub fn cache_root(config: &Config) -> PathBuf {
        config
            .cache
            .root
            .clone()
            .unwrap_or_else(Self::default_cache_root)
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> DeplumiResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> DeplumiResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DeplumiError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| DeplumiError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> DeplumiResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            DeplumiError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> DeplumiResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DeplumiError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.resolver.pip, "pip");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.cache.root = Some(temp.path().join("cache"));

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.cache.root, Some(temp.path().join("cache")));
    }

    #[tokio::test]
    async fn invalid_file_is_config_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache\nroot = ").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, DeplumiError::ConfigInvalid { .. }));
    }

    #[test]
    fn cache_root_prefers_configured_path() {
        let mut config = Config::default();
        config.cache.root = Some(PathBuf::from("/srv/deplumi"));
        assert_eq!(ConfigManager::cache_root(&config), PathBuf::from("/srv/deplumi"));
    }
}
