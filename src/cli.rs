// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jobloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobloop",
    version,
    about = "Run a plan of cooperative jobs round-robin, honouring their dependencies.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    ///
    /// Default: `Jobloop.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Jobloop.toml")]
    pub config: String,

    /// Resume the jobs persisted in the snapshot instead of starting the plan.
    #[arg(long)]
    pub resume: bool,

    /// Parse + validate, print the plan, but don't run any job.
    #[arg(long)]
    pub dry_run: bool,

    /// Stop (pause and persist the queue) after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub stop_after: Option<f64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
