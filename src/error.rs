//! Error types for deplumi
//!
//! All modules use `DeplumiResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for deplumi operations
pub type DeplumiResult<T> = Result<T, DeplumiError>;

/// All errors that can occur in deplumi
#[derive(Error, Debug)]
pub enum DeplumiError {
    // Package errors
    #[error("Unable to detect package type in {0}: no Pipfile found")]
    UnsupportedPackageType(PathBuf),

    #[error("Lockfile not found: {0}")]
    LockfileMissing(PathBuf),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {}:\n{}", status_display(.status), crate::process::error_tail(.stdout, .stderr))]
    ProcessFailure {
        command: String,
        status: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },

    // Code generation errors
    #[error("Unknown resource type {type_name} for binding '{name}'")]
    UnknownResourceType { name: String, type_name: String },

    #[error("Failed to resolve attribute '{attribute}' of resource '{name}': {reason}")]
    AttributeUnavailable {
        name: String,
        attribute: String,
        reason: String,
    },

    #[error("Generated accessor module is invalid: {0}")]
    CodeGenInvariantViolation(String),

    // Cache errors
    #[error("Build directory {0} is incomplete (interrupted materialization)")]
    PartialCacheState(PathBuf),

    // Bundle errors
    #[error("Failed to write archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Failed to walk source tree {path}: {reason}")]
    SourceWalk { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid bindings file {path}: {reason}")]
    BindingsInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Provisioning errors
    #[error("Provisioning failed for {resource}: {reason}")]
    Provision { resource: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

fn status_display(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl DeplumiError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error (the process could not be spawned)
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Check if error is retryable
    ///
    /// Nothing is retried internally; this tells the caller whether rerunning
    /// the whole build may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProcessFailure { .. } | Self::CommandFailed { .. } | Self::Provision { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedPackageType(_) => Some("Add a Pipfile to the package directory"),
            Self::LockfileMissing(_) => Some("Run: pipenv lock"),
            Self::CommandFailed { .. } => Some("Check that pipenv and pip are installed and on PATH"),
            Self::PartialCacheState(_) => {
                Some("Delete the build directory and rebuild, or run: deplumi cache clear --partial")
            }
            Self::CodeGenInvariantViolation(_) => Some("This is a bug in deplumi, please report it"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DeplumiError::UnsupportedPackageType(PathBuf::from("/src/app"));
        assert!(err.to_string().contains("Unable to detect package type"));
    }

    #[test]
    fn process_failure_display_includes_status_and_stderr() {
        let err = DeplumiError::ProcessFailure {
            command: "pip install".to_string(),
            status: Some(1),
            stdout: Vec::new(),
            stderr: b"No matching distribution found for nosuchpkg".to_vec(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("No matching distribution"));
    }

    #[test]
    fn error_hint() {
        let err = DeplumiError::LockfileMissing(PathBuf::from("Pipfile.lock"));
        assert_eq!(err.hint(), Some("Run: pipenv lock"));
    }

    #[test]
    fn error_retryable() {
        let failure = DeplumiError::ProcessFailure {
            command: "pipenv".to_string(),
            status: Some(2),
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        assert!(failure.is_retryable());
        assert!(!DeplumiError::CodeGenInvariantViolation("x".to_string()).is_retryable());
    }
}
