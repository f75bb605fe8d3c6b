//! Build command - turn a package directory into an archive

use crate::bindings;
use crate::cli::args::{BuildArgs, OutputFormat};
use crate::codegen::Bindings;
use crate::config::Config;
use crate::error::DeplumiResult;
use crate::package::BuildContext;
use crate::process::TokioProcessRunner;
use crate::ui::{self, TaskSpinner, UiContext};
use std::sync::Arc;
use tracing::debug;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> DeplumiResult<()> {
    let ctx = UiContext::detect();

    let bindings = match args.bindings {
        Some(ref path) => bindings::load(path).await?,
        None => {
            debug!("No bindings file given, accessor module will be empty");
            Bindings::new()
        }
    };

    let build = BuildContext::new(config.clone(), Arc::new(TokioProcessRunner::new()));

    let mut spinner = TaskSpinner::new(&ctx);
    if matches!(args.format, OutputFormat::Table) {
        spinner.start(&format!("Building {}", args.source.display()));
    }
    let artifact = match build.build_package(&args.source, &bindings).await {
        Ok(artifact) => artifact,
        Err(e) => {
            spinner.stop_error("Build failed");
            return Err(e);
        }
    };
    spinner.clear();

    match args.format {
        OutputFormat::Table => {
            ui::step_ok_detail(&ctx, "Archive written", &artifact.path.display().to_string());
            ui::key_value(&ctx, "sha256", &artifact.sha256);
            ui::key_value(&ctx, "cache key", &artifact.cache_key);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&artifact)?),
        OutputFormat::Plain => {
            println!("{}", artifact.path.display());
            println!("{}", artifact.sha256);
        }
    }

    Ok(())
}
