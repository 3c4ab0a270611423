// src/lib.rs

pub mod artifact;
pub mod cli;
pub mod config;
pub mod dag;
pub mod discover;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod store;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, DEFAULT_CONFIG_FILE, load_and_validate};
use crate::dag::DependencyGraph;
use crate::discover::{DirectorySource, GroupSource};
use crate::engine::{LogReporter, Orchestrator, OrchestratorOptions, RunRequest, RunSummary};
use crate::exec::CommandGenerator;
use crate::fs::{FileSystem, RealFileSystem};
use crate::store::store_for_mode;
use crate::types::FailurePolicy;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - discovery
/// - the orchestrator with the command generator and configured store
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let input_dir = fs.canonicalize(&args.input)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| input_dir.join(DEFAULT_CONFIG_FILE));
    let cfg = load_and_validate(&config_path)?;

    let options = options_from_args(&cfg, &args)?;
    let output_dir = match &args.output {
        Some(out) => std::path::absolute(out)?,
        None => cfg.output_dir_for(&input_dir),
    };

    let source =
        DirectorySource::from_config(Arc::clone(&fs), &cfg)?.skip_dir(output_dir.clone());
    let units = source.discover(&input_dir)?;
    let request = RunRequest::from_units(units, &input_dir, &output_dir);

    if args.dry_run {
        print_dry_run(&request, &options)?;
        return Ok(());
    }

    let generator = Arc::new(
        CommandGenerator::new(cfg.generator.cmd.clone())
            .with_progress_pattern(cfg.progress_regex()?),
    );
    let store = store_for_mode(cfg.store.mode, &input_dir);
    let reporter = Arc::new(LogReporter::new(request.total_files()));
    let orchestrator = Orchestrator::new(options, generator, store, fs, reporter);

    // Ctrl-C → cancel the run.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let summary = orchestrator.run_with_cancel(request, cancel).await?;
    print_summary(&summary);
    Ok(())
}

/// Config values with CLI overrides applied.
pub fn options_from_args(cfg: &ConfigFile, args: &CliArgs) -> Result<OrchestratorOptions> {
    let mut options = OrchestratorOptions::from(cfg);
    if let Some(n) = args.concurrency {
        if n == 0 {
            bail!("--concurrency must be >= 1");
        }
        options.concurrency = n;
    }
    if args.strict {
        options.failure_policy = FailurePolicy::Strict;
    }
    Ok(options)
}

/// Dry-run output: per language, the units and the edges between them.
fn print_dry_run(request: &RunRequest, options: &OrchestratorOptions) -> Result<()> {
    let graph = DependencyGraph::from_groups(request.units.clone())?;

    println!("treedoc dry-run");
    println!("  input = {}", request.input_dir.display());
    println!("  output = {}", request.output_dir.display());
    println!("  concurrency = {}", options.concurrency);
    println!("  failure_policy = {:?}", options.failure_policy);
    println!();

    for (language, units) in &request.units {
        println!("{language} ({} units):", units.len());
        for unit in units {
            let dir = relative_to(&request.input_dir, &unit.directory);
            println!("  - {} ({} files)", dir.display(), unit.files.len());
            if let Some(parent) = graph
                .dependents_of(&unit.id)
                .first()
                .and_then(|id| graph.unit(id))
            {
                println!(
                    "      before: {}",
                    relative_to(&request.input_dir, &parent.directory).display()
                );
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.cancelled {
        println!("run cancelled; no artifacts promoted");
    }
    for (language, path) in &summary.artifacts {
        println!("{language}: {}", path.display());
    }
    for (id, message) in &summary.failed {
        println!("failed {id}: {message}");
    }
    for id in &summary.skipped {
        println!("skipped {id}");
    }
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}
