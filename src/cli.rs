// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `batchflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "batchflow",
    version,
    about = "Run a hierarchical batch flow of dependent shell commands.",
    long_about = None
)]
pub struct CliArgs {
    /// Flow definition document (JSON, or TOML with a `.toml` extension).
    #[arg(long, short = 'f', value_name = "PATH")]
    pub definition: PathBuf,

    /// Runner config file (TOML).
    ///
    /// Default: `batchflow.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers; overrides `[executor].workers`.
    #[arg(long, short = 'j', value_name = "N")]
    pub workers: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BATCHFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task tree and dependencies, but don't
    /// execute any commands.
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
