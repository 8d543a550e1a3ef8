// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use crate::dag::{RunOutcome, Scheduler};
use crate::errors::{JobloopError, Result};
use crate::job::Job;

/// Options for the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Restore the queue from the snapshot instead of using the given jobs.
    pub resume: bool,
    /// Request a stop after this long.
    pub stop_after: Option<Duration>,
}

/// Drives a [`Scheduler`] from a Tokio runtime.
///
/// The scheduler is blocking by nature (work units run on the caller's
/// thread), so it is moved onto a blocking thread. Ctrl-C and the optional
/// deadline only raise the scheduler's stop flag; the loop notices it
/// between two steps, and the shell then pauses and persists the queue.
pub struct Runtime {
    scheduler: Scheduler,
    options: RuntimeOptions,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .finish()
    }
}

impl Runtime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self { scheduler, options }
    }

    /// Run `jobs` (or the restored snapshot) until drained or stopped.
    pub async fn run(self, jobs: Vec<Job>) -> Result<RunOutcome> {
        info!(
            resume = self.options.resume,
            jobs = jobs.len(),
            "jobloop runtime started"
        );

        let stop = self.scheduler.stop_handle();

        // Ctrl-C -> graceful stop.
        let ctrl_c = {
            let stop = stop.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                info!("Ctrl+C received; stopping after the current step");
                stop.request();
            })
        };

        let deadline = self.options.stop_after.map(|after| {
            let stop = stop.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                info!(?after, "stop deadline reached");
                stop.request();
            })
        });

        let resume = self.options.resume;
        let mut scheduler = self.scheduler;
        let worker = tokio::task::spawn_blocking(move || -> Result<RunOutcome> {
            let outcome = if resume {
                scheduler.restart()?
            } else {
                scheduler.process_all(jobs)?
            };

            if outcome == RunOutcome::Interrupted {
                scheduler.stop()?;
            }
            Ok(outcome)
        });

        let result = worker
            .await
            .map_err(|e| JobloopError::Other(anyhow::Error::from(e)));

        ctrl_c.abort();
        if let Some(deadline) = deadline {
            deadline.abort();
        }

        let outcome = result??;
        info!(?outcome, "runtime exiting");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::engine::NullSink;
    use crate::fs::mock::MockFileSystem;
    use crate::fs::FileSystem;
    use crate::job::WorkRegistry;
    use crate::snapshot::{FileSnapshotStore, SnapshotStore};
    use crate::types::JobStatus;

    fn sleeper(registry: &WorkRegistry, name: &str, steps: u32) -> Job {
        Job::builder("sleep")
            .id(crate::types::JobId::from_name(name))
            .args(json!({ "steps": steps, "step_ms": 20 }))
            .build(registry)
            .unwrap()
    }

    #[tokio::test]
    async fn drains_without_stop() {
        let registry = WorkRegistry::with_builtins();
        let jobs = vec![sleeper(&registry, "a", 1), sleeper(&registry, "b", 1)];
        let scheduler = Scheduler::new(2, registry).with_sink(NullSink);

        let outcome = Runtime::new(scheduler, RuntimeOptions::default())
            .run(jobs)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Drained);
    }

    #[tokio::test]
    async fn deadline_pauses_and_persists_queue() {
        let fs = MockFileSystem::new();
        let store = FileSnapshotStore::with_fs("jobs.json", Arc::new(fs.clone()));
        let registry = WorkRegistry::with_builtins();
        let jobs = vec![sleeper(&registry, "a", 200), sleeper(&registry, "b", 200)];
        let scheduler = Scheduler::new(2, registry)
            .with_store(store.clone())
            .with_sink(NullSink);

        let options = RuntimeOptions {
            resume: false,
            stop_after: Some(Duration::from_millis(100)),
        };
        let outcome = Runtime::new(scheduler, options).run(jobs).await.unwrap();

        assert_eq!(outcome, RunOutcome::Interrupted);
        assert!(fs.is_file(Path::new("jobs.json")));
        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == JobStatus::Paused));
    }
}
