// src/types.rs

//! Small value types shared across the crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used to derive deterministic job ids from plan names.
const JOB_NAMESPACE: Uuid = Uuid::from_u128(0x6a6f_626c_6f6f_7000_8000_0000_0000_0001);

/// Stable identity of a job; the key of the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id derived from a name.
    ///
    /// The same name always maps to the same id, which lets a snapshot taken
    /// by one process be resumed by another that loaded the same plan.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&JOB_NAMESPACE, name.as_bytes()))
    }

    /// Wrap a caller-supplied value (handy for ordered ids in tests).
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a job.
///
/// ```text
/// NOT_STARTED -> STARTED <-> PAUSED
/// STARTED -> POSTPONED -> STARTED
/// STARTED -> FINISHED | FAILED   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    NotStarted,
    Started,
    Paused,
    /// Waiting on dependencies that have not reached a terminal status.
    Postponed,
    Failed,
    Finished,
}

impl JobStatus {
    /// `FINISHED` and `FAILED` are terminal: the job is evicted and never
    /// mutated again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::NotStarted => "NOT_STARTED",
            JobStatus::Started => "STARTED",
            JobStatus::Paused => "PAUSED",
            JobStatus::Postponed => "POSTPONED",
            JobStatus::Failed => "FAILED",
            JobStatus::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
