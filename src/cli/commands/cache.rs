//! Cache command - inspect and manage the dependency cache

use crate::cache::{CacheEntry, CacheState, DependencyCache, LockSpec};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::DeplumiResult;
use crate::process::TokioProcessRunner;
use console::style;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> DeplumiResult<()> {
    let cache = DependencyCache::new(
        ConfigManager::cache_root(config),
        config.cache.completion_marker,
        Arc::new(TokioProcessRunner::new()),
    );

    match args.action {
        CacheAction::List { format } => list_entries(&cache, format).await,
        CacheAction::Key { lockfile } => show_key(&lockfile).await,
        CacheAction::Path => {
            println!("{}", cache.root().display());
            Ok(())
        }
        CacheAction::Clear { partial, yes } => clear_entries(&cache, partial, yes).await,
    }
}

/// List build directories
async fn list_entries(cache: &DependencyCache, format: OutputFormat) -> DeplumiResult<()> {
    let entries = cache.entries().await?;

    match format {
        OutputFormat::Table => print_entry_table(cache, &entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.path.display());
            }
        }
    }

    Ok(())
}

fn print_entry_table(cache: &DependencyCache, entries: &[CacheEntry]) {
    if entries.is_empty() {
        println!("No build directories in {}", cache.root().display());
        return;
    }

    println!("{:<20} {:<10} {:<10}", "KEY", "STATE", "ARCHIVES");
    println!("{}", "-".repeat(42));

    for entry in entries {
        let state_display = match entry.state {
            CacheState::Complete => style("complete").green().to_string(),
            CacheState::Partial => style("partial").yellow().to_string(),
            CacheState::Miss => style("miss").dim().to_string(),
        };
        // Pad before styling so ANSI codes don't break alignment
        let state_display = format!("{}{}", state_display, " ".repeat(10 - entry.state.to_string().len()));

        println!(
            "{:<20} {} {:<10}",
            short_key(&entry.key),
            state_display,
            entry.archives.len()
        );
    }

    println!();
    println!("Total: {} build dir(s) in {}", entries.len(), cache.root().display());
}

fn short_key(key: &str) -> String {
    if key.len() > 16 {
        format!("{}...", &key[..16])
    } else {
        key.to_string()
    }
}

/// Print the cache key a lockfile maps to
async fn show_key(lockfile: &Path) -> DeplumiResult<()> {
    let lock = LockSpec::read(lockfile).await?;
    println!("{}", lock.key());
    Ok(())
}

/// Remove build directories (all, or only partial ones)
async fn clear_entries(cache: &DependencyCache, partial_only: bool, skip_confirm: bool) -> DeplumiResult<()> {
    let to_remove: Vec<CacheEntry> = cache
        .entries()
        .await?
        .into_iter()
        .filter(|e| !partial_only || e.state == CacheState::Partial)
        .collect();

    if to_remove.is_empty() {
        if partial_only {
            println!("No partial build directories found.");
        } else {
            println!("No build directories to clear.");
        }
        return Ok(());
    }

    println!("This will remove {} build dir(s):", to_remove.len());
    for entry in &to_remove {
        println!(
            "  {} {} ({}, {} archive(s))",
            style("•").red(),
            short_key(&entry.key),
            entry.state,
            entry.archives.len()
        );
    }
    println!();

    if !skip_confirm {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut removed = 0;
    for entry in &to_remove {
        debug!("Removing build dir: {}", entry.key);
        cache.remove(entry).await?;
        removed += 1;
    }

    println!("{} removed {} build dir(s)", style("✓").green(), removed);

    Ok(())
}
