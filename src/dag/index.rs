// src/dag/index.rs

//! Reverse dependency index: job id -> jobs waiting on it.

use std::collections::{HashMap, VecDeque};

use crate::job::Job;
use crate::types::{JobId, JobStatus};

/// Maps a job id to the ordered list of dependents registered under it.
///
/// An id is present only while some dependent still waits to be told how
/// that job ended. The entry is removed as soon as the job reaches a
/// terminal status and its dependents are notified.
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    dependents: HashMap<JobId, Vec<JobId>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` under each dependency it is still waiting on.
    ///
    /// Dependencies already recorded as terminal are skipped, so no entry is
    /// created that nobody would ever clear.
    pub fn register(&mut self, job: &Job) {
        for dependency in job.unresolved_dependencies() {
            let list = self.dependents.entry(dependency).or_default();
            if !list.contains(&job.id()) {
                list.push(job.id());
            }
        }
    }

    /// Record `status` in every dependent of `id` still present in `queue`,
    /// then drop the entry for `id`.
    ///
    /// Returns the ids of the dependents whose status was updated. Must only
    /// be called with a terminal status, once per job.
    pub fn notify_completion(
        &mut self,
        id: JobId,
        status: JobStatus,
        queue: &mut VecDeque<Job>,
    ) -> Vec<JobId> {
        debug_assert!(status.is_terminal(), "notify_completion with {status}");

        let Some(dependents) = self.dependents.remove(&id) else {
            return Vec::new();
        };

        let mut notified = Vec::with_capacity(dependents.len());
        for dependent in dependents {
            if let Some(job) = queue.iter_mut().find(|j| j.id() == dependent) {
                if job.record_dependency_status(id, status) {
                    notified.push(dependent);
                }
            }
        }
        notified
    }

    /// Forget `dependent` wherever it is registered (e.g. it left the queue
    /// before its dependencies finished). Empty entries are removed.
    pub fn unregister(&mut self, dependent: JobId) {
        self.dependents.retain(|_, list| {
            list.retain(|id| *id != dependent);
            !list.is_empty()
        });
    }

    pub fn dependents_of(&self, id: JobId) -> &[JobId] {
        self.dependents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.dependents.contains_key(&id)
    }

    /// Number of ids with waiting dependents.
    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Step, WorkRegistry};

    fn registry() -> WorkRegistry {
        let mut registry = WorkRegistry::new();
        registry.register_fn("noop", |_| {
            Ok(Box::new(|| -> anyhow::Result<Step> { Ok(Step::Done) }))
        });
        registry
    }

    fn job(id: u128, deps: &[u128]) -> Job {
        let mut builder = Job::builder("noop").id(JobId::from_u128(id));
        for dep in deps {
            builder = builder.depends_on(JobId::from_u128(*dep));
        }
        builder.build(&registry()).unwrap()
    }

    #[test]
    fn register_appends_in_admission_order() {
        let mut index = DependencyIndex::new();
        index.register(&job(2, &[1]));
        index.register(&job(3, &[1]));

        assert_eq!(
            index.dependents_of(JobId::from_u128(1)),
            &[JobId::from_u128(2), JobId::from_u128(3)]
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn notify_updates_dependents_and_removes_entry() {
        let mut index = DependencyIndex::new();
        let mut queue: VecDeque<Job> = [job(2, &[1]), job(3, &[1, 9])].into();
        for j in &queue {
            index.register(j);
        }

        let notified = index.notify_completion(JobId::from_u128(1), JobStatus::Failed, &mut queue);

        assert_eq!(notified, vec![JobId::from_u128(2), JobId::from_u128(3)]);
        assert!(!index.contains(JobId::from_u128(1)));
        assert!(index.contains(JobId::from_u128(9)));
        assert!(queue[0].dependencies_resolved());
        assert!(!queue[1].dependencies_resolved());
        assert_eq!(
            queue[1].dependency_status(JobId::from_u128(1)),
            Some(JobStatus::Failed)
        );

        // A second notification finds nothing to do.
        let again = index.notify_completion(JobId::from_u128(1), JobStatus::Failed, &mut queue);
        assert!(again.is_empty());
    }

    #[test]
    fn evicted_dependents_are_skipped() {
        let mut index = DependencyIndex::new();
        index.register(&job(2, &[1]));
        let mut queue = VecDeque::new();

        let notified = index.notify_completion(JobId::from_u128(1), JobStatus::Finished, &mut queue);
        assert!(notified.is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn unregister_drops_empty_entries() {
        let mut index = DependencyIndex::new();
        index.register(&job(2, &[1, 5]));
        index.register(&job(3, &[1]));

        index.unregister(JobId::from_u128(2));

        assert_eq!(index.dependents_of(JobId::from_u128(1)), &[JobId::from_u128(3)]);
        assert!(!index.contains(JobId::from_u128(5)));
    }
}
