// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `treedoc`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "treedoc",
    version,
    about = "Generate per-language artifacts across a directory tree, children before parents.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory to process.
    #[arg(value_name = "INPUT", default_value = ".")]
    pub input: PathBuf,

    /// Path to the config file (TOML).
    ///
    /// Default: `Treedoc.toml` in the input directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output directory for promoted artifacts (overrides `[run].output_dir`).
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Number of concurrent workers (overrides `[run].concurrency`).
    #[arg(long, short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Skip the ancestors of failed units instead of running them anyway.
    #[arg(long)]
    pub strict: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TREEDOC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Discover units and print the plan without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
