//! External process execution
//!
//! Every tool deplumi drives (pipenv, pip) goes through a `ProcessRunner`.
//! The trait is the seam that lets the dependency cache be exercised without
//! the real tools installed.

use crate::error::{DeplumiError, DeplumiResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Max number of output lines to include in process error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of process output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub fn error_tail(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

/// A command to execute
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program name or path
    pub program: OsString,
    /// Arguments
    pub args: Vec<OsString>,
    /// Variables layered over the inherited environment
    pub env: BTreeMap<String, OsString>,
    /// Working directory (inherited when unset)
    pub cwd: Option<PathBuf>,
    /// Fail on nonzero exit
    pub checked: bool,
}

impl CommandSpec {
    /// Create a checked command with no arguments
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            checked: true,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Override one environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Don't fail on nonzero exit
    pub fn unchecked(mut self) -> Self {
        self.checked = false;
        self
    }

    /// Human-readable command line, for logs and errors
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code (`None` when terminated by a signal)
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turn a nonzero exit into `ProcessFailure`
    pub fn check(self, command: &CommandSpec) -> DeplumiResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(DeplumiError::ProcessFailure {
                command: command.display(),
                status: self.status,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }
}

/// Abstract process execution interface
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a command to completion, capturing both output streams.
    ///
    /// When `command.checked` is set, a nonzero exit is returned as
    /// `DeplumiError::ProcessFailure` with the captured output attached.
    async fn run(&self, command: &CommandSpec) -> DeplumiResult<ProcessOutput>;
}

/// Runs commands as real child processes via tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    /// Create a new process runner
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &CommandSpec) -> DeplumiResult<ProcessOutput> {
        debug!("Executing: {}", command.display());

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref cwd) = command.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| DeplumiError::command_failed(command.display(), e))?;

        let result = ProcessOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        };

        if !result.success() {
            debug!(
                "{} exited with {:?}: {}",
                command.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        if command.checked {
            result.check(command)
        } else {
            Ok(result)
        }
    }
}
