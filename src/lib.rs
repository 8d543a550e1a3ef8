// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod job;
pub mod logging;
pub mod snapshot;
pub mod types;
pub mod workloads;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::config::plan::{admission_order, build_jobs};
use crate::dag::{RunOutcome, Scheduler};
use crate::engine::{Runtime, RuntimeOptions};
use crate::job::{TimeBudget, WorkRegistry};
use crate::snapshot::FileSnapshotStore;
use crate::types::JobId;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and validation
/// - the work registry with the built-in work kinds
/// - scheduler + snapshot store
/// - the async runtime (Ctrl-C and `--stop-after` handling)
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let stop_after = args
        .stop_after
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|e| anyhow!("invalid --stop-after value {secs}: {e}"))
        })
        .transpose()?;

    let registry = WorkRegistry::with_builtins();
    let jobs = if args.resume {
        Vec::new()
    } else {
        build_jobs(&cfg, &registry, Utc::now())?
    };

    let scheduler = Scheduler::new(cfg.scheduler.pool_size, registry)
        .with_store(FileSnapshotStore::new(&cfg.scheduler.snapshot_path));

    let options = RuntimeOptions {
        resume: args.resume,
        stop_after,
    };

    match Runtime::new(scheduler, options).run(jobs).await? {
        RunOutcome::Drained => info!("all jobs reached a terminal status"),
        RunOutcome::Interrupted => info!(
            snapshot = %cfg.scheduler.snapshot_path,
            "stopped; resume with --resume"
        ),
    }
    Ok(())
}

fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    println!("jobloop dry-run");
    println!("  scheduler.pool_size = {}", cfg.scheduler.pool_size);
    println!("  scheduler.snapshot_path = {}", cfg.scheduler.snapshot_path);
    println!();

    let order = admission_order(cfg)?;
    println!("jobs ({}), in admission order:", order.len());
    for name in order {
        let job = &cfg.job[name];
        println!("  - {name} ({})", JobId::from_name(name));
        println!("      work: {}", job.work);
        if !job.args.is_null() {
            println!("      args: {}", job.args);
        }
        if !job.after.is_empty() {
            println!("      after: {:?}", job.after);
        }
        if let Some(limit) = TimeBudget::try_from_secs_f64(job.max_running_time)?.ceiling() {
            println!("      max_running_time: {limit:?}");
        }
        if job.max_restarts > 0 {
            println!("      max_restarts: {}", job.max_restarts);
        }
        if let Some(delay) = job.start_after {
            println!("      start_after: {delay}s");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
