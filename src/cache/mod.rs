//! Content-addressed dependency cache
//!
//! Build directories are keyed by the SHA3-256 hash of a package's lockfile.
//! Each unique lockfile is resolved and installed once; afterwards the
//! directory is reused as-is and never re-populated.
//!
//! # Cache States
//!
//! | State | On disk | Behavior |
//! |-------|---------|----------|
//! | Miss | no directory | materialize |
//! | Partial | directory without completion marker | `PartialCacheState` error |
//! | Complete | directory (with marker, when markers are on) | reuse |
//!
//! With `cache.completion_marker = false`, any existing directory counts as
//! complete. An interrupted materialization then goes unnoticed, so that mode
//! only exists for caches populated by older tooling.

pub mod lockfile;
pub mod resolver;

pub use lockfile::{CacheKey, LockSpec};
pub use resolver::Resolver;

use crate::error::{DeplumiError, DeplumiResult};
use crate::process::ProcessRunner;
use crate::registry::OnceMap;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Written into a build directory once it is fully populated
pub const COMPLETE_MARKER: &str = ".deplumi-complete";

/// State of a build directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// No directory exists (will be created)
    Miss,
    /// Directory exists but materialization never finished
    Partial,
    /// Directory is fully populated
    Complete,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss => write!(f, "miss"),
            Self::Partial => write!(f, "partial"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// A build directory found in the cache root
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub path: PathBuf,
    pub state: CacheState,
    /// Archives built from this directory
    pub archives: Vec<PathBuf>,
}

/// Maps lockfile hashes to materialized dependency directories
pub struct DependencyCache {
    root: PathBuf,
    completion_marker: bool,
    runner: Arc<dyn ProcessRunner>,
    in_flight: OnceMap<CacheKey, PathBuf>,
}

impl DependencyCache {
    /// Create a cache rooted at `root`
    pub fn new(root: impl Into<PathBuf>, completion_marker: bool, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            root: root.into(),
            completion_marker,
            runner,
            in_flight: OnceMap::new(),
        }
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build directory path for a key (whether or not it exists)
    pub fn build_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.to_hex())
    }

    /// Inspect the on-disk state of a key's build directory
    pub async fn state(&self, key: &CacheKey) -> DeplumiResult<CacheState> {
        self.state_of(&self.build_dir(key)).await
    }

    async fn state_of(&self, dir: &Path) -> DeplumiResult<CacheState> {
        if !exists(dir).await? {
            return Ok(CacheState::Miss);
        }
        if !self.completion_marker {
            return Ok(CacheState::Complete);
        }
        if exists(&dir.join(COMPLETE_MARKER)).await? {
            Ok(CacheState::Complete)
        } else {
            Ok(CacheState::Partial)
        }
    }

    /// Ensure the dependencies described by `lock_spec` are installed,
    /// returning the build directory.
    ///
    /// Concurrent calls with identical bytes share one materialization.
    /// Within a process, repeat calls return the memoized path without
    /// touching the filesystem or the process runner.
    pub async fn ensure_materialized(&self, lock_spec: &[u8], resolver: &Resolver) -> DeplumiResult<PathBuf> {
        let key = CacheKey::of(lock_spec);
        self.in_flight
            .get_or_try_init(key, || self.materialize(key, resolver))
            .await
    }

    async fn materialize(&self, key: CacheKey, resolver: &Resolver) -> DeplumiResult<PathBuf> {
        let dir = self.build_dir(&key);
        debug!("Using build dir {}", dir.display());

        match self.state_of(&dir).await? {
            CacheState::Complete => {
                debug!("Build dir {} already materialized", dir.display());
                return Ok(dir);
            }
            CacheState::Partial => return Err(DeplumiError::PartialCacheState(dir)),
            CacheState::Miss => {}
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DeplumiError::io(format!("creating cache root {}", self.root.display()), e))?;
        fs::create_dir(&dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                DeplumiError::PartialCacheState(dir.clone())
            } else {
                DeplumiError::io(format!("creating build dir {}", dir.display()), e)
            }
        })?;

        info!("Materializing dependencies into {}", dir.display());
        if let Err(e) = self.populate(&dir, resolver).await {
            warn!(
                "Materialization failed; partially populated build dir left at {}",
                dir.display()
            );
            return Err(e);
        }

        if self.completion_marker {
            fs::write(dir.join(COMPLETE_MARKER), key.to_hex())
                .await
                .map_err(|e| DeplumiError::io("writing completion marker", e))?;
        }

        info!("Dependencies materialized for {}", key);
        Ok(dir)
    }

    async fn populate(&self, dir: &Path, resolver: &Resolver) -> DeplumiResult<()> {
        let exported = self.runner.run(&resolver.export_command(dir)).await?;

        let mut requirements = tempfile::Builder::new()
            .prefix("deplumi-requirements-")
            .suffix(".txt")
            .tempfile()
            .map_err(|e| DeplumiError::io("creating requirements file", e))?;
        requirements
            .write_all(&exported.stdout)
            .and_then(|()| requirements.flush())
            .map_err(|e| DeplumiError::io("writing requirements file", e))?;

        self.runner
            .run(&resolver.install_command(dir, requirements.path()))
            .await?;
        Ok(())
    }

    /// List build directories in the cache root
    pub async fn entries(&self) -> DeplumiResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        let mut archives: Vec<PathBuf> = Vec::new();

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(DeplumiError::io("reading cache root", e)),
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| DeplumiError::io("reading cache entry", e))?
        {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if path.extension().is_some_and(|ext| ext == "zip") {
                archives.push(path);
                continue;
            }
            if name.parse::<CacheKey>().is_err() {
                continue;
            }

            let state = self.state_of(&path).await?;
            entries.push(CacheEntry {
                key: name,
                path,
                state,
                archives: Vec::new(),
            });
        }

        for entry in &mut entries {
            entry.archives = archives
                .iter()
                .filter(|a| {
                    a.file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with(&entry.key))
                })
                .cloned()
                .collect();
            entry.archives.sort();
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Remove a build directory and the archives built from it
    pub async fn remove(&self, entry: &CacheEntry) -> DeplumiResult<()> {
        debug!("Removing build dir {}", entry.path.display());
        fs::remove_dir_all(&entry.path)
            .await
            .map_err(|e| DeplumiError::io(format!("removing {}", entry.path.display()), e))?;
        for archive in &entry.archives {
            fs::remove_file(archive)
                .await
                .map_err(|e| DeplumiError::io(format!("removing {}", archive.display()), e))?;
        }
        Ok(())
    }
}

async fn exists(path: &Path) -> DeplumiResult<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| DeplumiError::io(format!("inspecting {}", path.display()), e))
}
