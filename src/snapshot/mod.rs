// src/snapshot/mod.rs

//! Durable snapshots of the scheduler queue.
//!
//! A snapshot is the ordered list of queued jobs as [`JobRecord`]s. Only
//! coarse state survives (status, accumulated running time, restart count,
//! dependency statuses); the work unit's internal progress does not, and is
//! rebuilt from the record's [`WorkTarget`] on restore.
//!
//! The on-disk layout is an internal detail and is not promised to be
//! stable across versions.

pub mod file;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::job::{TimeBudget, WorkTarget};
use crate::types::{JobId, JobStatus};

pub use file::FileSnapshotStore;

/// Persisted form of a [`Job`](crate::job::Job).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub target: WorkTarget,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    pub running_time: Duration,
    #[serde(default)]
    pub max_running_time: TimeBudget,
    pub restarts: u32,
    pub max_restarts: u32,
    #[serde(default)]
    pub dependencies: Vec<JobId>,
    #[serde(default)]
    pub dependency_statuses: BTreeMap<JobId, JobStatus>,
    pub status: JobStatus,
}

/// Where `stop` writes the queue and `restart` reads it back.
pub trait SnapshotStore: Send {
    fn save(&mut self, records: &[JobRecord]) -> Result<()>;
    fn load(&self) -> Result<Vec<JobRecord>>;
}

/// Keeps the last snapshot in memory; useful when persistence is not wanted.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    records: Vec<JobRecord>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&mut self, records: &[JobRecord]) -> Result<()> {
        self.records = records.to_vec();
        Ok(())
    }

    fn load(&self) -> Result<Vec<JobRecord>> {
        Ok(self.records.clone())
    }
}
