// src/dag/scheduler.rs

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::dag::graph::validate_batch;
use crate::dag::index::DependencyIndex;
use crate::dag::scheduler_step::{FaultKind, RunOutcome, SchedulerStep};
use crate::engine::{EventSink, SchedulerEvent, TracingSink};
use crate::errors::{JobError, JobloopError, Result, ScheduleError};
use crate::job::{Job, Progress, WorkRegistry};
use crate::snapshot::file::DEFAULT_SNAPSHOT_PATH;
use crate::snapshot::{FileSnapshotStore, SnapshotStore};
use crate::types::{JobId, JobStatus};

/// Longest nap taken when a whole rotation had nothing runnable.
const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(50);

/// Cloneable flag asking a running scheduler to stop between two steps.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Cooperative round-robin scheduler over a bounded pool of jobs.
///
/// It is responsible for:
/// - admitting jobs into a fixed-capacity FIFO ring
/// - gating jobs on their start time and dependencies
/// - resuming one job by one step per iteration and rotating it
/// - routing faults to a retry or a terminal failure
/// - telling dependents when a job finishes or fails
/// - persisting and restoring the queue
///
/// Exactly one work unit step runs at any instant, on the caller's thread.
pub struct Scheduler {
    queue: VecDeque<Job>,
    capacity: usize,
    index: DependencyIndex,
    /// Jobs handed to `process_all` that are not admitted yet.
    backlog: VecDeque<Job>,
    /// Terminal status of every job evicted so far.
    outcomes: HashMap<JobId, JobStatus>,
    registry: WorkRegistry,
    store: Box<dyn SnapshotStore>,
    sink: Box<dyn EventSink>,
    stop: StopHandle,
    /// Consecutive steps that postponed a job on its dependencies.
    blocked_streak: usize,
    /// Consecutive steps that resumed nothing.
    idle_streak: usize,
    idle_backoff: Duration,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("queue", &self.queue)
            .field("capacity", &self.capacity)
            .field("index", &self.index)
            .field("backlog", &self.backlog.len())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Scheduler with `pool_size` slots (at least one), snapshots in
    /// `jobs.json` and events rendered through `tracing`.
    pub fn new(pool_size: usize, registry: WorkRegistry) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: pool_size.max(1),
            index: DependencyIndex::new(),
            backlog: VecDeque::new(),
            outcomes: HashMap::new(),
            registry,
            store: Box::new(FileSnapshotStore::new(DEFAULT_SNAPSHOT_PATH)),
            sink: Box::new(TracingSink),
            stop: StopHandle::default(),
            blocked_streak: 0,
            idle_streak: 0,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }

    pub fn with_store(mut self, store: impl SnapshotStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued jobs, head of rotation first.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.queue.iter()
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.queue.iter().find(|j| j.id() == id)
    }

    /// Terminal status of an evicted job.
    pub fn outcome_of(&self, id: JobId) -> Option<JobStatus> {
        self.outcomes.get(&id).copied()
    }

    pub fn dependency_index(&self) -> &DependencyIndex {
        &self.index
    }

    /// Jobs given to `process_all` and not admitted yet.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn registry(&self) -> &WorkRegistry {
        &self.registry
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Admit `job` at the tail of the rotation.
    ///
    /// Fails with `QueueFull` (handing the job back) when every slot is
    /// taken. Dependencies must be queued, waiting in the backlog, or
    /// already terminal; a dependency that already ended has its status
    /// recorded right away.
    pub fn schedule(&mut self, mut job: Job) -> std::result::Result<(), ScheduleError> {
        if self.queue.len() >= self.capacity {
            return Err(ScheduleError::QueueFull {
                capacity: self.capacity,
                job: Box::new(job),
            });
        }

        let id = job.id();
        if self.is_queued(id) || self.in_backlog(id) {
            return Err(ScheduleError::DuplicateJob(id));
        }

        let pending: Vec<JobId> = job.unresolved_dependencies().collect();
        if let Some(dependency) = pending.iter().copied().find(|dep| {
            !self.outcomes.contains_key(dep) && !self.is_queued(*dep) && !self.in_backlog(*dep)
        }) {
            return Err(ScheduleError::UnknownDependency { job: id, dependency });
        }

        for dependency in pending {
            if let Some(status) = self.outcomes.get(&dependency).copied() {
                job.record_dependency_status(dependency, status);
            }
        }

        self.index.register(&job);
        self.queue.push_back(job);
        self.sink.record(SchedulerEvent::Admitted {
            id,
            queued: self.queue.len(),
            capacity: self.capacity,
        });
        Ok(())
    }

    /// Take a job out of the queue without running it.
    ///
    /// Its dependents are not notified: the job never reached a terminal
    /// status, so they stay postponed.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        let pos = self.queue.iter().position(|j| j.id() == id)?;
        let job = self.queue.remove(pos)?;
        self.index.unregister(id);
        Some(job)
    }

    /// One run-loop iteration on the head of the rotation.
    pub fn step(&mut self) -> SchedulerStep {
        let now = Utc::now();
        let Some(job) = self.queue.front_mut() else {
            return SchedulerStep::Idle;
        };
        let id = job.id();

        if let Some(start_at) = job.start_at().filter(|_| job.is_deferred_at(now)) {
            self.blocked_streak = 0;
            self.idle_streak += 1;
            self.rotate();
            self.sink.record(SchedulerEvent::Deferred { id, start_at });
            return SchedulerStep::Deferred(id);
        }

        if !job.dependencies_resolved() {
            let waiting_on = job.unresolved_dependencies().count();
            job.set_status(JobStatus::Postponed);
            self.blocked_streak += 1;
            self.idle_streak += 1;
            self.rotate();
            self.sink.record(SchedulerEvent::Postponed { id, waiting_on });
            return SchedulerStep::Postponed(id);
        }

        self.blocked_streak = 0;
        self.idle_streak = 0;

        if job.status() != JobStatus::Started {
            job.set_status(JobStatus::Started);
            self.sink.record(SchedulerEvent::Started { id });
        }

        match job.run() {
            Ok(Progress::Advanced) => {
                let running_time = job.running_time();
                self.rotate();
                self.sink.record(SchedulerEvent::Stepped { id, running_time });
                SchedulerStep::Progressed(id)
            }
            Ok(Progress::Exhausted) => {
                self.evict_head(JobStatus::Finished, String::new());
                SchedulerStep::Completed(id)
            }
            Err(err) => {
                let kind = match err {
                    JobError::TimeLimitExceeded { .. } => FaultKind::TimeLimit,
                    JobError::WorkUnitFault { .. } => FaultKind::WorkUnit,
                };
                let reason = format!("{err:#}");

                if job.restarts() < job.max_restarts() {
                    // The work unit keeps its progress; only the bookkeeping
                    // advances.
                    job.count_restart();
                    let restarts = job.restarts();
                    let max_restarts = job.max_restarts();
                    self.rotate();
                    self.sink.record(SchedulerEvent::Retrying {
                        id,
                        restarts,
                        max_restarts,
                        reason,
                    });
                    SchedulerStep::Retrying { id, restarts, kind }
                } else {
                    self.evict_head(JobStatus::Failed, reason);
                    SchedulerStep::Failed { id, kind }
                }
            }
        }
    }

    /// Drive the loop until the queue is empty or a stop is requested.
    ///
    /// Returns `Stalled` when every queued job waits on a dependency that
    /// cannot run anymore.
    pub fn run(&mut self) -> Result<RunOutcome> {
        loop {
            if self.stop.is_requested() {
                return Ok(RunOutcome::Interrupted);
            }

            let step = self.step();
            match step {
                SchedulerStep::Idle => return Ok(RunOutcome::Drained),
                SchedulerStep::Postponed(_) if self.is_stalled() => {
                    return Err(self.stalled_error());
                }
                _ => {}
            }
            self.maybe_nap(&step);
        }
    }

    /// Admit every job, draining the loop one step at a time whenever the
    /// pool is full, then run the queue to completion.
    ///
    /// The whole batch is validated first: dependencies must be resolvable
    /// and acyclic. Jobs not yet admitted when a stop is requested stay in
    /// the backlog and are persisted by [`stop`](Self::stop).
    pub fn process_all<I>(&mut self, jobs: I) -> Result<RunOutcome>
    where
        I: IntoIterator<Item = Job>,
    {
        let batch: Vec<Job> = jobs.into_iter().collect();
        validate_batch(&batch, |id| self.is_known(id))?;
        self.backlog.extend(batch);

        if self.admit_backlog()? == RunOutcome::Interrupted {
            return Ok(RunOutcome::Interrupted);
        }
        self.run()
    }

    /// Pause every job and persist the queue (then the backlog) to the
    /// snapshot store.
    ///
    /// On success the scheduler is left empty: its jobs live in the
    /// snapshot. Returns the number of persisted jobs.
    pub fn stop(&mut self) -> Result<usize> {
        for job in self.queue.iter_mut().chain(self.backlog.iter_mut()) {
            job.pause();
            // Backlog jobs were never notified; the snapshot must not name a
            // dependency that ended in this process as pending.
            let ended: Vec<_> = job
                .unresolved_dependencies()
                .filter_map(|dep| self.outcomes.get(&dep).map(|status| (dep, *status)))
                .collect();
            for (dep, status) in ended {
                job.record_dependency_status(dep, status);
            }
        }

        let records: Vec<_> = self
            .queue
            .iter()
            .chain(self.backlog.iter())
            .map(Job::to_record)
            .collect();
        self.store.save(&records)?;

        self.queue.clear();
        self.backlog.clear();
        self.index = DependencyIndex::new();
        self.blocked_streak = 0;
        self.idle_streak = 0;
        self.stop.clear();

        self.sink.record(SchedulerEvent::Stopped {
            persisted: records.len(),
        });
        Ok(records.len())
    }

    /// Load the snapshot and rebuild its jobs with status `NOT_STARTED`.
    ///
    /// Running time, restart counts and dependency statuses are kept as
    /// persisted; work units start fresh.
    pub fn restore(&mut self) -> Result<Vec<Job>> {
        let records = self.store.load()?;
        let mut jobs = Vec::with_capacity(records.len());
        for record in records {
            let mut job = Job::from_record(record, &self.registry)?;
            job.set_status(JobStatus::NotStarted);
            jobs.push(job);
        }

        self.sink.record(SchedulerEvent::Restored { jobs: jobs.len() });
        Ok(jobs)
    }

    /// Restore the snapshot, re-admit its jobs and run them to completion.
    pub fn restart(&mut self) -> Result<RunOutcome> {
        let jobs = self.restore()?;
        self.process_all(jobs)
    }

    fn admit_backlog(&mut self) -> Result<RunOutcome> {
        while let Some(mut job) = self.backlog.pop_front() {
            loop {
                if self.stop.is_requested() {
                    self.backlog.push_front(job);
                    return Ok(RunOutcome::Interrupted);
                }

                match self.schedule(job) {
                    Ok(()) => break,
                    Err(ScheduleError::QueueFull { job: rejected, .. }) => {
                        job = *rejected;
                        let step = self.step();
                        let stuck = match step {
                            SchedulerStep::Idle => true,
                            SchedulerStep::Postponed(_) => self.is_stalled(),
                            _ => false,
                        };
                        if stuck {
                            self.backlog.push_front(job);
                            return Err(self.stalled_error());
                        }
                        self.maybe_nap(&step);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(RunOutcome::Drained)
    }

    fn evict_head(&mut self, status: JobStatus, reason: String) {
        let Some(mut job) = self.queue.pop_front() else {
            return;
        };
        let id = job.id();
        job.set_status(status);

        match status {
            JobStatus::Finished => self.sink.record(SchedulerEvent::Finished {
                id,
                running_time: job.running_time(),
            }),
            _ => self.sink.record(SchedulerEvent::Failed { id, reason }),
        }

        self.outcomes.insert(id, status);
        for dependent in self.index.notify_completion(id, status, &mut self.queue) {
            self.sink.record(SchedulerEvent::DependencyResolved {
                dependent,
                dependency: id,
                status,
            });
        }
    }

    fn rotate(&mut self) {
        if let Some(job) = self.queue.pop_front() {
            self.queue.push_back(job);
        }
    }

    /// A full rotation postponed every queued job. Nothing resumed since,
    /// so no dependency status can change anymore.
    fn is_stalled(&self) -> bool {
        !self.queue.is_empty() && self.blocked_streak >= self.queue.len()
    }

    fn stalled_error(&self) -> JobloopError {
        JobloopError::Stalled {
            waiting: self.queue.iter().map(Job::id).collect(),
            unadmitted: self.backlog.len(),
        }
    }

    /// After a full rotation that resumed nothing, sleep until the nearest
    /// start time (capped by the idle backoff) instead of spinning.
    fn maybe_nap(&self, step: &SchedulerStep) {
        if step.resumed() || self.idle_streak < self.queue.len() {
            return;
        }

        let now = Utc::now();
        let nap = self
            .queue
            .iter()
            .filter_map(|j| j.start_at())
            .filter(|at| *at > now)
            .min()
            .and_then(|at| (at - now).to_std().ok())
            .map_or(self.idle_backoff, |until| until.min(self.idle_backoff));

        if !nap.is_zero() {
            std::thread::sleep(nap);
        }
    }

    fn is_queued(&self, id: JobId) -> bool {
        self.queue.iter().any(|j| j.id() == id)
    }

    fn in_backlog(&self, id: JobId) -> bool {
        self.backlog.iter().any(|j| j.id() == id)
    }

    fn is_known(&self, id: JobId) -> bool {
        self.outcomes.contains_key(&id) || self.is_queued(id) || self.in_backlog(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NullSink;
    use crate::job::Step;
    use crate::snapshot::MemorySnapshotStore;
    use anyhow::anyhow;
    use serde_json::json;

    fn registry() -> WorkRegistry {
        let mut registry = WorkRegistry::new();
        registry.register_fn("count", |args| {
            let total = args["steps"].as_u64().unwrap_or(1);
            let mut done = 0;
            Ok(Box::new(move || -> anyhow::Result<Step> {
                if done == total {
                    return Ok(Step::Done);
                }
                done += 1;
                Ok(Step::More)
            }))
        });
        registry.register_fn("broken", |_| {
            Ok(Box::new(|| -> anyhow::Result<Step> { Err(anyhow!("boom")) }))
        });
        registry
    }

    fn scheduler(pool: usize) -> Scheduler {
        Scheduler::new(pool, registry())
            .with_store(MemorySnapshotStore::new())
            .with_sink(NullSink)
    }

    fn counting(id: u128, steps: u64) -> Job {
        Job::builder("count")
            .id(JobId::from_u128(id))
            .args(json!({ "steps": steps }))
            .build(&registry())
            .unwrap()
    }

    #[test]
    fn pool_size_is_at_least_one() {
        assert_eq!(scheduler(0).capacity(), 1);
    }

    #[test]
    fn step_on_empty_queue_is_idle() {
        assert_eq!(scheduler(1).step(), SchedulerStep::Idle);
    }

    #[test]
    fn rotation_is_round_robin() {
        let mut s = scheduler(3);
        s.schedule(counting(1, 5)).unwrap();
        s.schedule(counting(2, 5)).unwrap();
        s.schedule(counting(3, 5)).unwrap();

        let order: Vec<_> = (0..6).map(|_| s.step().job().unwrap()).collect();
        let ids: Vec<_> = [1, 2, 3, 1, 2, 3].map(JobId::from_u128).to_vec();
        assert_eq!(order, ids);
    }

    #[test]
    fn exhausted_job_is_evicted_as_finished() {
        let mut s = scheduler(1);
        s.schedule(counting(1, 1)).unwrap();

        assert_eq!(s.step(), SchedulerStep::Progressed(JobId::from_u128(1)));
        assert_eq!(s.step(), SchedulerStep::Completed(JobId::from_u128(1)));
        assert!(s.is_empty());
        assert_eq!(s.outcome_of(JobId::from_u128(1)), Some(JobStatus::Finished));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut s = scheduler(2);
        s.schedule(counting(1, 1)).unwrap();
        let err = s.schedule(counting(1, 1)).unwrap_err();
        assert!(matches!(err, ScheduleError::DuplicateJob(_)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn faulting_job_without_retries_fails() {
        let mut s = scheduler(1);
        let job = Job::builder("broken").id(JobId::from_u128(1)).build(&registry()).unwrap();
        s.schedule(job).unwrap();

        assert_eq!(
            s.step(),
            SchedulerStep::Failed {
                id: JobId::from_u128(1),
                kind: FaultKind::WorkUnit
            }
        );
        assert_eq!(s.outcome_of(JobId::from_u128(1)), Some(JobStatus::Failed));
    }

    #[test]
    fn dependency_already_finished_is_prefilled() {
        let mut s = scheduler(2);
        s.schedule(counting(1, 0)).unwrap();
        assert_eq!(s.run().unwrap(), RunOutcome::Drained);

        let dependent = Job::builder("count")
            .id(JobId::from_u128(2))
            .depends_on(JobId::from_u128(1))
            .build(&registry())
            .unwrap();
        s.schedule(dependent).unwrap();

        let job = s.job(JobId::from_u128(2)).unwrap();
        assert!(job.dependencies_resolved());
        assert!(s.dependency_index().is_empty());
    }

    #[test]
    fn removed_job_leaves_the_index() {
        let mut s = scheduler(2);
        s.schedule(counting(1, 3)).unwrap();
        let dependent = Job::builder("count")
            .id(JobId::from_u128(2))
            .depends_on(JobId::from_u128(1))
            .build(&registry())
            .unwrap();
        s.schedule(dependent).unwrap();

        let removed = s.remove(JobId::from_u128(2)).unwrap();
        assert_eq!(removed.id(), JobId::from_u128(2));
        assert!(s.dependency_index().is_empty());
        assert!(s.remove(JobId::from_u128(2)).is_none());
    }

    #[test]
    fn stop_request_interrupts_run_and_keeps_queue() {
        let mut s = scheduler(1);
        s.schedule(counting(1, 3)).unwrap();
        s.stop_handle().request();

        assert_eq!(s.run().unwrap(), RunOutcome::Interrupted);
        assert_eq!(s.len(), 1);

        assert_eq!(s.stop().unwrap(), 1);
        assert!(s.is_empty());
        assert!(!s.stop_handle().is_requested());
    }
}
