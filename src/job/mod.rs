// src/job/mod.rs

//! Jobs: one work unit plus identity, dependencies, time and retry budgets.
//!
//! - [`work`] defines the work unit contract and the factory registry.
//! - [`timing`] holds the time budget and the guard measuring each resume.

pub mod timing;
pub mod work;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::{JobError, Result};
use crate::snapshot::JobRecord;
use crate::types::{JobId, JobStatus};

pub use timing::{TimeBudget, TimingGuard};
pub use work::{Step, WorkFactory, WorkRegistry, WorkTarget, WorkUnit};

/// Successful result of [`Job::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The unit performed one step and has more to do.
    Advanced,
    /// The unit had nothing left; this is normal completion.
    Exhausted,
}

/// A scheduled wrapper around exactly one work unit.
///
/// Status, dependency statuses and the retry counter are driven by the
/// [`Scheduler`](crate::dag::Scheduler); the job itself only moves through
/// `run`, `pause` and `finish`.
pub struct Job {
    id: JobId,
    target: WorkTarget,
    work: Box<dyn WorkUnit>,
    start_at: Option<DateTime<Utc>>,
    running_time: Duration,
    budget: TimeBudget,
    restarts: u32,
    max_restarts: u32,
    dependencies: Vec<JobId>,
    dependency_statuses: BTreeMap<JobId, JobStatus>,
    status: JobStatus,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("kind", &self.target.kind)
            .field("status", &self.status)
            .field("running_time", &self.running_time)
            .field("restarts", &self.restarts)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Start building a job for the given work kind.
    pub fn builder(kind: impl Into<String>) -> JobBuilder {
        JobBuilder::new(kind)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn target(&self) -> &WorkTarget {
        &self.target
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn start_at(&self) -> Option<DateTime<Utc>> {
        self.start_at
    }

    /// Cumulative wall-clock time spent inside the work unit.
    pub fn running_time(&self) -> Duration {
        self.running_time
    }

    pub fn budget(&self) -> TimeBudget {
        self.budget
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    pub fn dependencies(&self) -> &[JobId] {
        &self.dependencies
    }

    pub fn dependency_statuses(&self) -> &BTreeMap<JobId, JobStatus> {
        &self.dependency_statuses
    }

    pub fn dependency_status(&self, dependency: JobId) -> Option<JobStatus> {
        self.dependency_statuses.get(&dependency).copied()
    }

    /// Every declared dependency has reached a terminal status.
    ///
    /// A failed dependency counts as resolved: it unblocks dependents rather
    /// than failing them.
    pub fn dependencies_resolved(&self) -> bool {
        self.dependency_statuses.values().all(|s| s.is_terminal())
    }

    /// Dependencies whose last known status is not terminal.
    pub fn unresolved_dependencies(&self) -> impl Iterator<Item = JobId> + '_ {
        self.dependency_statuses
            .iter()
            .filter(|(_, status)| !status.is_terminal())
            .map(|(id, _)| *id)
    }

    /// Whether the start-time gate still holds the job back at `now`.
    pub fn is_deferred_at(&self, now: DateTime<Utc>) -> bool {
        self.start_at.is_some_and(|at| now < at)
    }

    /// Resume the work unit by exactly one step.
    ///
    /// The elapsed time is added to `running_time` after the step returns,
    /// and only then compared with the budget. Exhaustion wins over an
    /// overage detected on the same resume.
    pub fn run(&mut self) -> std::result::Result<Progress, JobError> {
        self.status = JobStatus::Started;

        let guard = TimingGuard::start();
        let step = self.work.advance();
        guard.stop(&mut self.running_time);

        match step {
            Ok(Step::Done) => Ok(Progress::Exhausted),
            Ok(Step::More) => {
                if self.budget.is_exceeded_by(self.running_time) {
                    return Err(self.time_limit_error());
                }
                Ok(Progress::Advanced)
            }
            Err(source) => Err(JobError::WorkUnitFault {
                id: self.id,
                source,
            }),
        }
    }

    /// Freeze the job. Touches neither the work unit nor the clock.
    pub fn pause(&mut self) {
        self.status = JobStatus::Paused;
    }

    /// Mark the job finished without running it.
    pub fn finish(&mut self) {
        self.status = JobStatus::Finished;
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        self.status = status;
    }

    /// Returns `true` if the recorded status changed.
    pub(crate) fn record_dependency_status(&mut self, dependency: JobId, status: JobStatus) -> bool {
        match self.dependency_statuses.get_mut(&dependency) {
            Some(slot) if *slot != status => {
                *slot = status;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn count_restart(&mut self) {
        self.restarts += 1;
    }

    fn time_limit_error(&self) -> JobError {
        JobError::TimeLimitExceeded {
            id: self.id,
            limit: self.budget.ceiling().unwrap_or_default(),
            running_time: self.running_time,
        }
    }

    /// Persistable view of this job.
    pub fn to_record(&self) -> JobRecord {
        JobRecord {
            id: self.id,
            target: self.target.clone(),
            start_at: self.start_at,
            running_time: self.running_time,
            max_running_time: self.budget,
            restarts: self.restarts,
            max_restarts: self.max_restarts,
            dependencies: self.dependencies.clone(),
            dependency_statuses: self.dependency_statuses.clone(),
            status: self.status,
        }
    }

    /// Rebuild a job from a record; the work unit starts fresh.
    pub fn from_record(record: JobRecord, registry: &WorkRegistry) -> Result<Self> {
        let work = registry.build(&record.target)?;

        let mut dependency_statuses = record.dependency_statuses;
        for dep in &record.dependencies {
            dependency_statuses.entry(*dep).or_insert(JobStatus::NotStarted);
        }

        Ok(Self {
            id: record.id,
            target: record.target,
            work,
            start_at: record.start_at,
            running_time: record.running_time,
            budget: record.max_running_time,
            restarts: record.restarts,
            max_restarts: record.max_restarts,
            dependencies: record.dependencies,
            dependency_statuses,
            status: record.status,
        })
    }
}

/// Builder for [`Job`].
#[derive(Debug, Clone)]
pub struct JobBuilder {
    id: Option<JobId>,
    target: WorkTarget,
    start_at: Option<DateTime<Utc>>,
    budget: TimeBudget,
    max_restarts: u32,
    dependencies: Vec<JobId>,
}

impl JobBuilder {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            target: WorkTarget::new(kind, Value::Null),
            start_at: None,
            budget: TimeBudget::Unlimited,
            max_restarts: 0,
            dependencies: Vec::new(),
        }
    }

    /// Use a fixed id instead of a random one.
    pub fn id(mut self, id: JobId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn args(mut self, args: Value) -> Self {
        self.target.args = args;
        self
    }

    pub fn start_at(mut self, at: DateTime<Utc>) -> Self {
        self.start_at = Some(at);
        self
    }

    pub fn max_running_time(mut self, limit: Duration) -> Self {
        self.budget = TimeBudget::Limited(limit);
        self
    }

    pub fn budget(mut self, budget: TimeBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = max;
        self
    }

    pub fn depends_on(mut self, dependency: JobId) -> Self {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    /// Construct the work unit through `registry` and produce the job.
    pub fn build(self, registry: &WorkRegistry) -> Result<Job> {
        let work = registry.build(&self.target)?;
        let dependency_statuses = self
            .dependencies
            .iter()
            .map(|dep| (*dep, JobStatus::NotStarted))
            .collect();

        Ok(Job {
            id: self.id.unwrap_or_default(),
            target: self.target,
            work,
            start_at: self.start_at,
            running_time: Duration::ZERO,
            budget: self.budget,
            restarts: 0,
            max_restarts: self.max_restarts,
            dependencies: self.dependencies,
            dependency_statuses,
            status: JobStatus::NotStarted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    fn registry() -> WorkRegistry {
        let mut registry = WorkRegistry::new();
        registry.register_fn("count", |args| {
            let total = args["steps"].as_u64().unwrap_or(1);
            let pause = Duration::from_millis(args["sleep_ms"].as_u64().unwrap_or(0));
            let mut done = 0;
            Ok(Box::new(move || -> anyhow::Result<Step> {
                if done == total {
                    return Ok(Step::Done);
                }
                std::thread::sleep(pause);
                done += 1;
                Ok(Step::More)
            }))
        });
        registry.register_fn("broken", |_| {
            Ok(Box::new(|| -> anyhow::Result<Step> { Err(anyhow!("disk on fire")) }))
        });
        registry
    }

    #[test]
    fn new_job_defaults() {
        let dep = JobId::from_u128(7);
        let job = Job::builder("count").depends_on(dep).build(&registry()).unwrap();

        assert_eq!(job.status(), JobStatus::NotStarted);
        assert_eq!(job.running_time(), Duration::ZERO);
        assert_eq!(job.restarts(), 0);
        assert_eq!(job.budget(), TimeBudget::Unlimited);
        assert_eq!(job.dependency_status(dep), Some(JobStatus::NotStarted));
        assert!(!job.dependencies_resolved());
    }

    #[test]
    fn run_marks_started_and_signals_exhaustion() {
        let mut job = Job::builder("count")
            .args(json!({ "steps": 2 }))
            .build(&registry())
            .unwrap();

        assert_eq!(job.run().unwrap(), Progress::Advanced);
        assert_eq!(job.status(), JobStatus::Started);
        assert_eq!(job.run().unwrap(), Progress::Advanced);
        assert_eq!(job.run().unwrap(), Progress::Exhausted);
    }

    #[test]
    fn pause_and_finish_only_touch_status() {
        let mut job = Job::builder("count").build(&registry()).unwrap();
        job.run().unwrap();
        let running = job.running_time();

        job.pause();
        job.pause();
        assert_eq!(job.status(), JobStatus::Paused);
        assert_eq!(job.running_time(), running);

        job.finish();
        assert_eq!(job.status(), JobStatus::Finished);
    }

    #[test]
    fn overage_is_detected_after_the_step() {
        let mut job = Job::builder("count")
            .args(json!({ "steps": 1, "sleep_ms": 30 }))
            .max_running_time(Duration::from_millis(10))
            .build(&registry())
            .unwrap();

        let err = job.run().unwrap_err();
        assert!(matches!(err, JobError::TimeLimitExceeded { .. }));
        assert!(job.running_time() >= Duration::from_millis(30));
    }

    #[test]
    fn unlimited_budget_never_raises_time_limit() {
        let mut job = Job::builder("count")
            .args(json!({ "steps": 2, "sleep_ms": 20 }))
            .build(&registry())
            .unwrap();

        assert!(job.run().is_ok());
        assert!(job.run().is_ok());
        assert!(job.running_time() >= Duration::from_millis(40));
    }

    #[test]
    fn zero_budget_trips_on_first_step() {
        let mut job = Job::builder("count")
            .args(json!({ "steps": 3, "sleep_ms": 1 }))
            .max_running_time(Duration::ZERO)
            .build(&registry())
            .unwrap();

        assert!(matches!(job.run(), Err(JobError::TimeLimitExceeded { .. })));
    }

    #[test]
    fn running_time_sums_each_resume() {
        let mut job = Job::builder("count")
            .args(json!({ "steps": 3, "sleep_ms": 5 }))
            .build(&registry())
            .unwrap();

        let mut last = Duration::ZERO;
        for _ in 0..3 {
            job.run().unwrap();
            assert!(job.running_time() >= last + Duration::from_millis(5));
            last = job.running_time();
        }
    }

    #[test]
    fn work_unit_errors_become_faults() {
        let mut job = Job::builder("broken").build(&registry()).unwrap();
        match job.run() {
            Err(JobError::WorkUnitFault { id, source }) => {
                assert_eq!(id, job.id());
                assert_eq!(source.to_string(), "disk on fire");
            }
            other => panic!("expected WorkUnitFault, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_fails_to_build() {
        let err = Job::builder("nope").build(&registry()).unwrap_err();
        assert!(matches!(err, crate::errors::JobloopError::UnknownWork(_)));
    }

    #[test]
    fn record_round_trip_keeps_accounting() {
        let registry = registry();
        let dep = JobId::from_u128(1);
        let mut job = Job::builder("count")
            .id(JobId::from_u128(2))
            .args(json!({ "steps": 4 }))
            .depends_on(dep)
            .max_restarts(3)
            .build(&registry)
            .unwrap();
        job.record_dependency_status(dep, JobStatus::Failed);
        job.run().unwrap();
        job.count_restart();
        job.pause();

        let restored = Job::from_record(job.to_record(), &registry).unwrap();
        assert_eq!(restored.id(), job.id());
        assert_eq!(restored.running_time(), job.running_time());
        assert_eq!(restored.restarts(), 1);
        assert_eq!(restored.status(), JobStatus::Paused);
        assert_eq!(restored.dependency_status(dep), Some(JobStatus::Failed));
    }
}
