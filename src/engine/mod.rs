// src/engine/mod.rs

//! Observation and orchestration around the scheduler core.
//!
//! The [`Scheduler`](crate::dag::Scheduler) itself never logs. Everything it
//! has to say is a [`SchedulerEvent`] handed to an injected [`EventSink`];
//! [`TracingSink`] renders those events with `tracing`, tests record them.
//!
//! The async shell that drives the (blocking) scheduler from a Tokio
//! runtime, with Ctrl-C handling, lives in [`runtime`].

pub mod runtime;

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::types::{JobId, JobStatus};

pub use runtime::{Runtime, RuntimeOptions};

/// Everything noteworthy the scheduler does.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    Admitted {
        id: JobId,
        queued: usize,
        capacity: usize,
    },
    Deferred {
        id: JobId,
        start_at: DateTime<Utc>,
    },
    Postponed {
        id: JobId,
        waiting_on: usize,
    },
    Started {
        id: JobId,
    },
    Stepped {
        id: JobId,
        running_time: Duration,
    },
    Finished {
        id: JobId,
        running_time: Duration,
    },
    Retrying {
        id: JobId,
        restarts: u32,
        max_restarts: u32,
        reason: String,
    },
    Failed {
        id: JobId,
        reason: String,
    },
    DependencyResolved {
        dependent: JobId,
        dependency: JobId,
        status: JobStatus,
    },
    Stopped {
        persisted: usize,
    },
    Restored {
        jobs: usize,
    },
}

/// Observer receiving scheduler events.
pub trait EventSink: Send {
    fn record(&mut self, event: SchedulerEvent);
}

/// Default sink: structured `tracing` output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::Admitted { id, queued, capacity } => {
                info!(job = %id, queued, capacity, "job admitted to queue");
            }
            SchedulerEvent::Deferred { id, start_at } => {
                debug!(job = %id, %start_at, "start time not reached; rotating");
            }
            SchedulerEvent::Postponed { id, waiting_on } => {
                debug!(job = %id, waiting_on, "dependencies unresolved; job postponed");
            }
            SchedulerEvent::Started { id } => {
                info!(job = %id, "job started");
            }
            SchedulerEvent::Stepped { id, running_time } => {
                debug!(job = %id, ?running_time, "job advanced one step");
            }
            SchedulerEvent::Finished { id, running_time } => {
                info!(job = %id, ?running_time, "job finished");
            }
            SchedulerEvent::Retrying {
                id,
                restarts,
                max_restarts,
                reason,
            } => {
                warn!(job = %id, restarts, max_restarts, %reason, "job faulted; retrying");
            }
            SchedulerEvent::Failed { id, reason } => {
                warn!(job = %id, %reason, "job failed");
            }
            SchedulerEvent::DependencyResolved {
                dependent,
                dependency,
                status,
            } => {
                debug!(job = %dependent, %dependency, %status, "dependency reached terminal status");
            }
            SchedulerEvent::Stopped { persisted } => {
                info!(persisted, "scheduler stopped; queue persisted");
            }
            SchedulerEvent::Restored { jobs } => {
                info!(jobs, "scheduler state restored from snapshot");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&mut self, _event: SchedulerEvent) {}
}
