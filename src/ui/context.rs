//! Detects whether output goes to an interactive terminal

use std::io::IsTerminal;

const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Output mode for the current process
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Interactive when stderr is a terminal and no CI variable is set
    pub fn detect() -> Self {
        let interactive = std::io::stderr().is_terminal()
            && !CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self { interactive }
    }

    /// Plain output regardless of environment
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Whether spinners and symbols should be used
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}
