// src/errors.rs

//! Crate-wide error types.

use std::time::Duration;

use thiserror::Error;

use crate::job::Job;
use crate::types::JobId;

#[derive(Error, Debug)]
pub enum JobloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in job dependencies: {0}")]
    DependencyCycle(String),

    #[error("Unknown work kind: {0}")]
    UnknownWork(String),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Every queued job is waiting on a dependency that can never run.
    #[error(
        "scheduler stalled: {} queued job(s) wait on dependencies outside the pool ({unadmitted} job(s) not admitted)",
        .waiting.len()
    )]
    Stalled {
        waiting: Vec<JobId>,
        unadmitted: usize,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Admission failures. The queue is left untouched in every case.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// The pool has no spare slot; the rejected job is handed back.
    #[error("queue is full (capacity {capacity})")]
    QueueFull { capacity: usize, job: Box<Job> },

    #[error("job {job} depends on {dependency}, which was never admitted")]
    UnknownDependency { job: JobId, dependency: JobId },

    #[error("job {0} is already queued")]
    DuplicateJob(JobId),
}

impl ScheduleError {
    /// Recover the rejected job from a `QueueFull` error.
    pub fn into_job(self) -> Option<Job> {
        match self {
            ScheduleError::QueueFull { job, .. } => Some(*job),
            _ => None,
        }
    }
}

/// Faults raised by a single resume of a job.
///
/// Exhaustion of the work unit is not an error; see [`crate::job::Progress`].
#[derive(Error, Debug)]
pub enum JobError {
    #[error("job {id} ran for {running_time:?}, over its budget of {limit:?}")]
    TimeLimitExceeded {
        id: JobId,
        limit: Duration,
        running_time: Duration,
    },

    #[error("work unit of job {id} failed: {source}")]
    WorkUnitFault {
        id: JobId,
        #[source]
        source: anyhow::Error,
    },
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobloopError>;
