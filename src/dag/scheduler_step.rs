// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::types::JobId;

/// Why a resume did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    TimeLimit,
    WorkUnit,
}

/// Structured result of a single run-loop iteration.
///
/// This is useful for callers (and tests) that want to drive the loop one
/// head-of-rotation decision at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerStep {
    /// The queue is empty.
    Idle,
    /// Start time not reached; rotated without resuming.
    Deferred(JobId),
    /// Some dependency is not terminal yet; rotated without resuming.
    Postponed(JobId),
    /// Resumed one step, more work remains; rotated.
    Progressed(JobId),
    /// The work unit is exhausted; the job finished and was evicted.
    Completed(JobId),
    /// The resume faulted and a retry was granted; rotated.
    Retrying {
        id: JobId,
        restarts: u32,
        kind: FaultKind,
    },
    /// The resume faulted with no retries left; the job failed and was evicted.
    Failed { id: JobId, kind: FaultKind },
}

impl SchedulerStep {
    /// The job this step looked at, if any.
    pub fn job(&self) -> Option<JobId> {
        match self {
            SchedulerStep::Idle => None,
            SchedulerStep::Deferred(id)
            | SchedulerStep::Postponed(id)
            | SchedulerStep::Progressed(id)
            | SchedulerStep::Completed(id)
            | SchedulerStep::Retrying { id, .. }
            | SchedulerStep::Failed { id, .. } => Some(*id),
        }
    }

    /// Whether the step evicted a job, freeing a queue slot.
    pub fn freed_slot(&self) -> bool {
        matches!(self, SchedulerStep::Completed(_) | SchedulerStep::Failed { .. })
    }

    /// Whether the work unit was actually resumed.
    pub fn resumed(&self) -> bool {
        matches!(
            self,
            SchedulerStep::Progressed(_)
                | SchedulerStep::Completed(_)
                | SchedulerStep::Retrying { .. }
                | SchedulerStep::Failed { .. }
        )
    }
}

/// How a drain of the run-loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The queue is empty.
    Drained,
    /// A stop was requested; the queue is left as it was.
    Interrupted,
}
