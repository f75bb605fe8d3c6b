//! deplumi - function bundle builder
//!
//! Packages a source directory and its locked dependencies into a
//! deterministic zip, caching dependency installs by lockfile hash and
//! embedding a generated module that reaches bound cloud resources by name.

pub mod bindings;
pub mod bundle;
pub mod cache;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod journal;
pub mod package;
pub mod process;
pub mod provision;
pub mod registry;
pub mod ui;

pub use error::{DeplumiError, DeplumiResult};
pub use package::{BuildArtifact, BuildContext, Package};
