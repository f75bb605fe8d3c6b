//! Entry filters deciding which files enter an archive

use crate::config::schema::BundleConfig;
use std::path::{Component, Path};

/// Decides whether a file, given its path relative to its tree root,
/// belongs in the archive. Must be pure: it is called once per file.
pub trait EntryFilter: Send + Sync {
    fn include(&self, relative: &Path) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn include(&self, relative: &Path) -> bool {
        self(relative)
    }
}

/// Drops distribution metadata and packages the function runtime provides.
///
/// Only the first path component is inspected, so `foo.dist-info/METADATA`
/// and `boto3/client.py` are excluded while `app/boto3/shim.py` is kept.
#[derive(Debug, Clone)]
pub struct DefaultFilter {
    metadata_suffixes: Vec<String>,
    runtime_provided: Vec<String>,
}

impl DefaultFilter {
    pub fn new(config: &BundleConfig) -> Self {
        Self {
            metadata_suffixes: config.metadata_suffixes.clone(),
            runtime_provided: config.runtime_provided.clone(),
        }
    }
}

impl Default for DefaultFilter {
    fn default() -> Self {
        Self::new(&BundleConfig::default())
    }
}

impl EntryFilter for DefaultFilter {
    fn include(&self, relative: &Path) -> bool {
        let top = match relative.components().find(|c| !matches!(c, Component::CurDir)) {
            Some(Component::Normal(name)) => name.to_string_lossy(),
            _ => return true,
        };

        if self
            .metadata_suffixes
            .iter()
            .any(|suffix| top.ends_with(suffix.as_str()))
        {
            return false;
        }
        !self.runtime_provided.iter().any(|name| *name == top)
    }
}
