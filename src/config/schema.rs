//! Configuration schema for deplumi
//!
//! Configuration is stored at `~/.config/deplumi/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Dependency cache settings
    pub cache: CacheConfig,

    /// External resolver and installer settings
    pub resolver: ResolverConfig,

    /// Archive assembly settings
    pub bundle: BundleConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append build events to the journal
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
        }
    }
}

/// Dependency cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding build directories and archives
    /// (defaults to the platform cache dir)
    pub root: Option<PathBuf>,

    /// Write a completion marker after materialization and refuse
    /// build directories that lack one
    pub completion_marker: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            completion_marker: true,
        }
    }
}

/// Resolver tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// pipenv executable
    pub pipenv: String,

    /// Arguments that make pipenv print a flat requirements list
    pub export_args: Vec<String>,

    /// pip executable used for `--target` installs
    pub pip: String,

    /// Extra arguments passed to `pip install`
    pub install_args: Vec<String>,

    /// Additional environment for both tools
    pub env: BTreeMap<String, String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            pipenv: "pipenv".to_string(),
            export_args: vec!["lock".to_string(), "--requirements".to_string()],
            pip: "pip".to_string(),
            install_args: vec![],
            env: BTreeMap::new(),
        }
    }
}

/// Archive assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Top-level directory suffixes that mark distribution metadata
    pub metadata_suffixes: Vec<String>,

    /// Top-level packages supplied by the function runtime
    pub runtime_provided: Vec<String>,

    /// Name of the generated accessor module inside the archive
    pub accessor_module: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            metadata_suffixes: vec![".dist-info".to_string()],
            runtime_provided: vec!["boto3".to_string(), "botocore".to_string()],
            accessor_module: "__res__.py".to_string(),
        }
    }
}
