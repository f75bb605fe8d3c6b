//! Resolver and installer command lines
//!
//! Materialization is two external steps: pipenv flattens the lockfile into a
//! requirements list, then pip installs that list into the build directory
//! with `--target` so nothing lands in a virtualenv.

use crate::config::schema::ResolverConfig;
use crate::process::CommandSpec;
use std::path::{Path, PathBuf};

/// How to resolve and install one package's dependencies
#[derive(Debug, Clone)]
pub struct Resolver {
    project_root: PathBuf,
    pipfile: PathBuf,
    tools: ResolverConfig,
}

impl Resolver {
    /// Resolver for a pipenv project
    pub fn pipenv(project_root: impl Into<PathBuf>, pipfile: impl Into<PathBuf>, tools: ResolverConfig) -> Self {
        Self {
            project_root: project_root.into(),
            pipfile: pipfile.into(),
            tools,
        }
    }

    /// Command that prints the flattened requirement list on stdout
    pub fn export_command(&self, build_dir: &Path) -> CommandSpec {
        let spec = CommandSpec::new(&self.tools.pipenv)
            .args(&self.tools.export_args)
            .env("PIPENV_NOSPIN", "1")
            .env("PIPENV_PIPFILE", self.pipfile.as_os_str())
            .env("PIPENV_VIRTUALENV", build_dir.as_os_str())
            .env("PIPENV_VERBOSITY", "-1")
            .current_dir(&self.project_root);
        self.with_tool_env(spec)
    }

    /// Command that installs a requirements file into `build_dir`
    pub fn install_command(&self, build_dir: &Path, requirements: &Path) -> CommandSpec {
        let spec = CommandSpec::new(&self.tools.pip)
            .arg("install")
            .args(&self.tools.install_args)
            .arg("--target")
            .arg(build_dir.as_os_str())
            .arg("-r")
            .arg(requirements.as_os_str())
            .current_dir(&self.project_root);
        self.with_tool_env(spec)
    }

    fn with_tool_env(&self, mut spec: CommandSpec) -> CommandSpec {
        for (key, value) in &self.tools.env {
            spec = spec.env(key.clone(), value);
        }
        spec
    }
}
