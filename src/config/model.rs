// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::snapshot::file::DEFAULT_SNAPSHOT_PATH;

/// Plan as read from a TOML file, before validation.
///
/// ```toml
/// [scheduler]
/// pool_size = 3
/// snapshot_path = "jobs.json"
///
/// [job.collect]
/// work = "sleep"
/// args = { steps = 3, step_ms = 1000 }
/// max_running_time = 5.0
///
/// [job.report]
/// work = "sleep"
/// after = ["collect"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Scheduler settings from `[scheduler]`.
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// All jobs from `[job.<name>]`, keyed by job name.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// A validated plan. Build one with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub job: BTreeMap<String, JobConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        job: BTreeMap<String, JobConfig>,
    ) -> Self {
        Self { scheduler, job }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Number of jobs admitted to the rotation at once.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Where `stop` persists the queue and `--resume` reads it back.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

fn default_pool_size() -> usize {
    10
}

fn default_snapshot_path() -> String {
    DEFAULT_SNAPSHOT_PATH.to_string()
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Registered work kind (`sleep`, `files`, `fail`, ...).
    pub work: String,

    /// Arguments handed to the work factory.
    #[serde(default)]
    pub args: Value,

    /// Names of jobs that must reach a terminal status first.
    #[serde(default)]
    pub after: Vec<String>,

    /// Ceiling on cumulative running time, in seconds.
    ///
    /// Omitted means unlimited; `0` is a real (zero) ceiling.
    #[serde(default)]
    pub max_running_time: Option<f64>,

    /// Retries granted after a fault or an exceeded time budget.
    #[serde(default)]
    pub max_restarts: u32,

    /// Delay, in seconds from plan load, before the job may run.
    #[serde(default)]
    pub start_after: Option<f64>,
}
