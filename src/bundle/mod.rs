//! Deterministic archive assembly
//!
//! The bundler merges one or more source trees and any number of virtual
//! files into a single zip. Identical inputs always produce byte-identical
//! archives:
//!
//! - trees are walked in sorted order, one entry per regular file
//! - entry names are relative to their tree root, with forward slashes
//! - every entry is stamped with the zip epoch (1980-01-01 00:00:00)
//! - permissions are normalized to 0o755 (executable) or 0o644
//! - a path present in several trees takes the content of the last tree
//!
//! Walking and compression are blocking work and run on tokio's blocking
//! pool. The archive is written to a temporary file beside the destination
//! and renamed into place, so readers never observe a half-written zip.

pub mod filter;

pub use filter::{DefaultFilter, EntryFilter};

use crate::error::{DeplumiError, DeplumiResult};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A file that exists only in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    /// Archive path, forward-slash separated
    pub name: String,
    pub contents: Vec<u8>,
}

impl VirtualFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// What a finished build wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Files taken from source trees
    pub files: usize,
    /// Virtual files
    pub virtuals: usize,
    /// Files rejected by the filter
    pub skipped: usize,
}

/// A directory walked into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceTree {
    root: PathBuf,
    /// Top-level names never taken from this tree
    excluded: Vec<String>,
}

/// Assembles source trees and virtual files into one archive
#[derive(Default)]
pub struct Bundler {
    trees: Vec<SourceTree>,
    virtuals: Vec<VirtualFile>,
    filter: Option<Arc<dyn EntryFilter>>,
}

impl Bundler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source tree; later trees replace earlier ones on duplicate paths
    pub fn tree(self, root: impl Into<PathBuf>) -> Self {
        self.tree_excluding(root, std::iter::empty::<String>())
    }

    /// Add a source tree, leaving out the given top-level names.
    ///
    /// The exclusion applies to this tree only and is independent of the
    /// entry filter.
    pub fn tree_excluding<I, S>(mut self, root: impl Into<PathBuf>, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trees.push(SourceTree {
            root: root.into(),
            excluded: excluded.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add a virtual file; virtual files are never filtered
    pub fn virtual_file(mut self, file: VirtualFile) -> Self {
        self.virtuals.push(file);
        self
    }

    /// Only include tree files the filter accepts
    pub fn filter(mut self, filter: Arc<dyn EntryFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Write the archive to `dest`
    pub async fn build(self, dest: impl Into<PathBuf>) -> DeplumiResult<ArchiveSummary> {
        let dest = dest.into();
        tokio::task::spawn_blocking(move || self.build_blocking(dest))
            .await
            .map_err(|e| DeplumiError::Internal(format!("bundler task failed: {}", e)))?
    }

    fn build_blocking(self, dest: PathBuf) -> DeplumiResult<ArchiveSummary> {
        let archive_err = |reason: String| DeplumiError::Archive {
            path: dest.clone(),
            reason,
        };

        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .map_err(|e| DeplumiError::io(format!("creating {}", parent.display()), e))?;

        let (entries, skipped) = self.collect_entries()?;

        let staging = tempfile::Builder::new()
            .prefix(".deplumi-archive-")
            .suffix(".zip.tmp")
            .tempfile_in(&parent)
            .map_err(|e| DeplumiError::io("creating staging archive", e))?;
        let file = staging
            .reopen()
            .map_err(|e| DeplumiError::io("opening staging archive", e))?;

        let mut zip = ZipWriter::new(io::BufWriter::new(file));
        for entry in &entries {
            let options = entry_options(entry.mode, entry.len);
            zip.start_file(entry.name.as_str(), options)
                .map_err(|e| archive_err(format!("{}: {}", entry.name, e)))?;
            let mut source = File::open(&entry.source)
                .map_err(|e| DeplumiError::io(format!("reading {}", entry.source.display()), e))?;
            io::copy(&mut source, &mut zip)
                .map_err(|e| DeplumiError::io(format!("compressing {}", entry.source.display()), e))?;
        }
        for file in &self.virtuals {
            debug!("Adding virtual file {}", file.name);
            let options = entry_options(0o644, file.contents.len() as u64);
            zip.start_file(file.name.as_str(), options)
                .map_err(|e| archive_err(format!("{}: {}", file.name, e)))?;
            zip.write_all(&file.contents)
                .map_err(|e| DeplumiError::io(format!("writing {}", file.name), e))?;
        }

        let mut writer = zip.finish().map_err(|e| archive_err(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| DeplumiError::io("flushing archive", e))?;
        drop(writer);

        staging
            .persist(&dest)
            .map_err(|e| archive_err(format!("moving into place: {}", e.error)))?;

        info!(
            "Wrote {} ({} files, {} virtual, {} filtered)",
            dest.display(),
            entries.len(),
            self.virtuals.len(),
            skipped
        );
        Ok(ArchiveSummary {
            path: dest,
            files: entries.len(),
            virtuals: self.virtuals.len(),
            skipped,
        })
    }

    /// Walk every tree and decide the final entry list
    fn collect_entries(&self) -> DeplumiResult<(Vec<TreeEntry>, usize)> {
        let reserved: HashSet<&str> = self.virtuals.iter().map(|v| v.name.as_str()).collect();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut skipped = 0;

        for SourceTree { root, excluded } in &self.trees {
            let walk_err = |reason: String| DeplumiError::SourceWalk {
                path: root.clone(),
                reason,
            };

            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.map_err(|e| walk_err(e.to_string()))?;
                let path = entry.path();

                // Symlinks are followed for files only, never into directories
                let metadata = if entry.file_type().is_symlink() {
                    match fs::metadata(path) {
                        Ok(meta) => meta,
                        Err(e) => {
                            debug!("Skipping dangling link {}: {}", path.display(), e);
                            continue;
                        }
                    }
                } else {
                    entry.metadata().map_err(|e| walk_err(e.to_string()))?
                };
                if !metadata.is_file() {
                    continue;
                }

                let relative = path
                    .strip_prefix(root)
                    .map_err(|e| walk_err(e.to_string()))?;
                if is_excluded(relative, excluded) {
                    debug!("Leaving out {} from {}", relative.display(), root.display());
                    continue;
                }
                if let Some(filter) = &self.filter {
                    if !filter.include(relative) {
                        skipped += 1;
                        continue;
                    }
                }

                let name = archive_name(relative).ok_or_else(|| {
                    walk_err(format!("cannot archive path {}", relative.display()))
                })?;
                if reserved.contains(name.as_str()) {
                    warn!(
                        "{} in {} is shadowed by a generated file",
                        name,
                        root.display()
                    );
                    continue;
                }

                let entry = TreeEntry {
                    name,
                    source: path.to_path_buf(),
                    mode: normalized_mode(&metadata),
                    len: metadata.len(),
                };
                match positions.get(&entry.name) {
                    Some(&index) => {
                        warn!(
                            "{} from {} replaces {}",
                            entry.name,
                            root.display(),
                            entries[index].source.display()
                        );
                        entries[index] = entry;
                    }
                    None => {
                        positions.insert(entry.name.clone(), entries.len());
                        entries.push(entry);
                    }
                }
            }
        }

        Ok((entries, skipped))
    }
}

/// Build an archive from `trees` plus `virtuals`
pub async fn build(
    dest: impl Into<PathBuf>,
    trees: &[PathBuf],
    virtuals: Vec<VirtualFile>,
    filter: Option<Arc<dyn EntryFilter>>,
) -> DeplumiResult<ArchiveSummary> {
    let mut bundler = Bundler::new();
    for tree in trees {
        bundler = bundler.tree(tree.clone());
    }
    for file in virtuals {
        bundler = bundler.virtual_file(file);
    }
    if let Some(filter) = filter {
        bundler = bundler.filter(filter);
    }
    bundler.build(dest).await
}

fn is_excluded(relative: &Path, excluded: &[String]) -> bool {
    match relative.components().next() {
        Some(Component::Normal(first)) => excluded.iter().any(|name| first == name.as_str()),
        _ => false,
    }
}

struct TreeEntry {
    name: String,
    source: PathBuf,
    mode: u32,
    len: u64,
}

fn entry_options(mode: u32, len: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(mode)
        .large_file(len >= u32::MAX as u64)
}

/// Forward-slash archive name for a tree-relative path
fn archive_name(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(unix)]
fn normalized_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn normalized_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}
