//! Package builds
//!
//! `BuildContext::build_package` turns a source directory plus resource
//! bindings into a deployable archive:
//!
//! 1. Detect the package kind from its dependency declaration.
//! 2. Materialize dependencies through the shared dependency cache.
//! 3. Generate the accessor module from the bindings.
//! 4. Bundle dependencies, sources and the accessor module into one zip.
//!
//! The context owns every cross-build registry (in-flight materializations,
//! per-region artifact buckets), so independent builds can run concurrently
//! against one context.

pub mod pipenv;

pub use pipenv::PipenvPackage;

use crate::bundle::{Bundler, DefaultFilter, VirtualFile};
use crate::cache::{DependencyCache, LockSpec, COMPLETE_MARKER};
use crate::codegen::{self, Bindings};
use crate::config::{Config, ConfigManager};
use crate::error::{DeplumiError, DeplumiResult};
use crate::journal::{BuildEvent, BuildJournal};
use crate::process::ProcessRunner;
use crate::provision::{
    Access, BucketHandle, BucketSpec, Grant, ObjectHandle, ObjectSpec, PermissionRequest,
    Provisioner, RoleHandle,
};
use crate::registry::OnceMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Recognized package layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// Pipfile + Pipfile.lock
    Pipenv,
}

impl PackageKind {
    /// Detection order
    const ALL: &'static [Self] = &[Self::Pipenv];

    /// File whose presence selects this kind
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Pipenv => pipenv::PIPFILE,
        }
    }

    /// Detect the kind of the package at `source_root`
    pub async fn detect(source_root: &Path) -> DeplumiResult<Self> {
        for kind in Self::ALL {
            let marker = source_root.join(kind.marker());
            if fs::metadata(&marker).await.is_ok_and(|m| m.is_file()) {
                debug!("Detected {} package at {}", kind, source_root.display());
                return Ok(*kind);
            }
        }
        Err(DeplumiError::UnsupportedPackageType(source_root.to_path_buf()))
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipenv => write!(f, "pipenv"),
        }
    }
}

/// A finished archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifact {
    pub path: PathBuf,
    /// Hex SHA-256 of the archive bytes
    pub sha256: String,
    /// Hex cache key of the lockfile the archive was built against
    pub cache_key: String,
}

/// Shared state for all builds in a process
pub struct BuildContext {
    config: Config,
    cache: DependencyCache,
    buckets: OnceMap<String, BucketHandle>,
    journal: BuildJournal,
}

impl BuildContext {
    /// Create a context from configuration
    pub fn new(config: Config, runner: Arc<dyn ProcessRunner>) -> Self {
        let cache = DependencyCache::new(
            ConfigManager::cache_root(&config),
            config.cache.completion_marker,
            runner,
        );
        let journal = BuildJournal::new(&config);
        Self {
            config,
            cache,
            buckets: OnceMap::new(),
            journal,
        }
    }

    /// Replace the build journal
    pub fn with_journal(mut self, journal: BuildJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &DependencyCache {
        &self.cache
    }

    /// Build the package at `source_root` into an archive
    pub async fn build_package(&self, source_root: &Path, bindings: &Bindings) -> DeplumiResult<BuildArtifact> {
        // Detection comes first; nothing else touches disk for an unsupported package
        let kind = match PackageKind::detect(source_root).await {
            Ok(kind) => kind,
            Err(e) => {
                self.record_failure(source_root, &e).await;
                return Err(e);
            }
        };

        let names: Vec<&String> = bindings.keys().collect();
        self.journal
            .record(BuildEvent::Started, source_root, serde_json::json!({ "bindings": names }))
            .await;

        match self.build(kind, source_root, bindings).await {
            Ok(artifact) => {
                self.journal
                    .record(
                        BuildEvent::Completed,
                        source_root,
                        serde_json::json!({
                            "archive": artifact.path,
                            "sha256": artifact.sha256,
                            "cache_key": artifact.cache_key,
                        }),
                    )
                    .await;
                Ok(artifact)
            }
            Err(e) => {
                self.record_failure(source_root, &e).await;
                Err(e)
            }
        }
    }

    async fn record_failure(&self, source_root: &Path, error: &DeplumiError) {
        self.journal
            .record(
                BuildEvent::Failed,
                source_root,
                serde_json::json!({ "error": error.to_string() }),
            )
            .await;
    }

    async fn build(&self, kind: PackageKind, source_root: &Path, bindings: &Bindings) -> DeplumiResult<BuildArtifact> {
        let package = match kind {
            PackageKind::Pipenv => {
                let root = fs::canonicalize(source_root)
                    .await
                    .map_err(|e| DeplumiError::io(format!("resolving {}", source_root.display()), e))?;
                PipenvPackage::new(root)
            }
        };
        info!("Building {}", package.root().display());

        let lock = LockSpec::read(&package.lockfile()).await?;
        let key = lock.key();
        let build_dir = self
            .cache
            .ensure_materialized(&lock.bytes, &package.resolver(&self.config.resolver))
            .await?;

        let accessor = codegen::generate(bindings).await?;
        debug!("Generated accessor module for {} binding(s)", bindings.len());

        let dest = package.archive_path(self.cache.root(), &key);
        let summary = Bundler::new()
            .tree_excluding(build_dir, [COMPLETE_MARKER])
            .tree(package.root())
            .virtual_file(VirtualFile::new(
                self.config.bundle.accessor_module.clone(),
                accessor,
            ))
            .filter(Arc::new(DefaultFilter::new(&self.config.bundle)))
            .build(dest)
            .await?;

        let sha256 = file_sha256(&summary.path).await?;
        Ok(BuildArtifact {
            path: summary.path,
            sha256,
            cache_key: key.to_hex(),
        })
    }

    /// The shared archive bucket for `region`, declared on first use
    pub async fn artifact_bucket(&self, region: &str, provisioner: &dyn Provisioner) -> DeplumiResult<BucketHandle> {
        self.buckets
            .get_or_try_init(region.to_string(), || async {
                info!("Declaring artifact bucket for {}", region);
                provisioner
                    .declare_bucket(&BucketSpec::artifact_bucket(region))
                    .await
            })
            .await
    }
}

async fn file_sha256(path: &Path) -> DeplumiResult<String> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| DeplumiError::io(format!("reading {}", path.display()), e))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// A named package published to a region
pub struct Package {
    pub name: String,
    pub source: PathBuf,
    pub bindings: Bindings,
}

/// Everything declared for a published package
#[derive(Debug, Clone)]
pub struct PublishedPackage {
    pub artifact: BuildArtifact,
    pub bucket: BucketHandle,
    pub object: ObjectHandle,
    pub role: RoleHandle,
}

impl Package {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>, bindings: Bindings) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            bindings,
        }
    }

    /// Role request granting read/write (not manage) on every bound resource
    pub fn permission_request(&self) -> PermissionRequest {
        PermissionRequest {
            name: format!("{}-role", self.name),
            grants: self
                .bindings
                .iter()
                .map(|(name, handle)| Grant {
                    name: name.clone(),
                    type_name: handle.type_name().to_string(),
                    access: Access::ReadWrite,
                })
                .collect(),
        }
    }

    /// Build the package and declare its bucket object and role
    pub async fn publish(
        &self,
        ctx: &BuildContext,
        provisioner: &dyn Provisioner,
        region: &str,
    ) -> DeplumiResult<PublishedPackage> {
        let bucket = ctx.artifact_bucket(region, provisioner).await?;
        let artifact = ctx.build_package(&self.source, &self.bindings).await?;

        let object = provisioner
            .declare_object(&ObjectSpec {
                name: format!("{}-code", self.name),
                bucket: bucket.clone(),
                source: artifact.path.clone(),
                sha256: artifact.sha256.clone(),
            })
            .await?;
        let role = provisioner
            .declare_permission(&self.permission_request())
            .await?;

        info!("Published {} to {}", self.name, bucket.name);
        Ok(PublishedPackage {
            artifact,
            bucket,
            object,
            role,
        })
    }
}
