//! Pipenv-managed packages

use crate::cache::{CacheKey, Resolver};
use crate::config::schema::ResolverConfig;
use std::path::{Path, PathBuf};

/// Dependency declaration that marks a pipenv package
pub const PIPFILE: &str = "Pipfile";

/// Lockfile whose bytes key the dependency cache
pub const LOCKFILE: &str = "Pipfile.lock";

/// A package whose dependencies are declared in a Pipfile
#[derive(Debug, Clone)]
pub struct PipenvPackage {
    root: PathBuf,
}

impl PipenvPackage {
    /// `root` should already be canonical
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pipfile(&self) -> PathBuf {
        self.root.join(PIPFILE)
    }

    pub fn lockfile(&self) -> PathBuf {
        self.root.join(LOCKFILE)
    }

    /// Resolver that exports this package's lock and installs it
    pub fn resolver(&self, tools: &ResolverConfig) -> Resolver {
        Resolver::pipenv(&self.root, self.pipfile(), tools.clone())
    }

    /// Archive path for this package built against `key`.
    ///
    /// Packages sharing a lockfile share the build directory but not the
    /// archive, so the name also carries a digest of the source root.
    pub fn archive_path(&self, cache_root: &Path, key: &CacheKey) -> PathBuf {
        let source = CacheKey::of(self.root.as_os_str().as_encoded_bytes()).to_hex();
        cache_root.join(format!("{}-{}.zip", key.to_hex(), &source[..12]))
    }
}
