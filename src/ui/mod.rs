//! Terminal output helpers
//!
//! Spinners and colored status lines in an interactive terminal, plain
//! tagged lines (`[OK]`, `[WARN]`, ...) in CI or when piped.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, step_ok_detail, step_warn, step_warn_hint};
pub use progress::TaskSpinner;
