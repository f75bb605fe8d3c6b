//! Build journal
//!
//! Appends one JSON line per build event to `<state dir>/journal.log`.
//! Enabled by `general.journal`. Journal failures are logged and dropped;
//! they never fail a build.

use crate::config::{schema::Config, ConfigManager};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Build lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildEvent {
    #[serde(rename = "build.started")]
    Started,
    #[serde(rename = "build.completed")]
    Completed,
    #[serde(rename = "build.failed")]
    Failed,
}

/// Append-only JSON lines journal of builds
#[derive(Debug, Clone)]
pub struct BuildJournal {
    enabled: bool,
    path: PathBuf,
}

impl BuildJournal {
    /// Journal at the default state path, enabled per config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.journal,
            path: ConfigManager::journal_path(),
        }
    }

    /// Journal at an explicit path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            path: path.into(),
        }
    }

    /// Journal that records nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an event for the package at `source`
    pub async fn record(&self, event: BuildEvent, source: &Path, data: serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "source": source.display().to_string(),
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal entry: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write build journal {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
