// src/dag/graph.rs

//! Up-front checks on a batch of jobs before any of them is admitted.

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{JobloopError, Result, ScheduleError};
use crate::job::Job;
use crate::types::JobId;

/// Check that every pending dependency of `batch` can eventually resolve.
///
/// A dependency is acceptable when it is already recorded as terminal on
/// the job, when `is_known` says the scheduler has seen it (queued or
/// finished), or when it is part of the batch itself. Dependencies inside
/// the batch must not form a cycle.
pub fn validate_batch<'a, I, F>(batch: I, is_known: F) -> Result<()>
where
    I: IntoIterator<Item = &'a Job>,
    F: Fn(JobId) -> bool,
{
    let jobs: Vec<&Job> = batch.into_iter().collect();
    let ids: HashSet<JobId> = jobs.iter().map(|j| j.id()).collect();

    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<JobId, ()> = DiGraphMap::new();
    for job in &jobs {
        graph.add_node(job.id());
    }

    for job in &jobs {
        for dependency in job.unresolved_dependencies() {
            if dependency == job.id() {
                return Err(JobloopError::DependencyCycle(format!(
                    "job {} depends on itself",
                    job.id()
                )));
            }
            if ids.contains(&dependency) {
                graph.add_edge(dependency, job.id(), ());
            } else if !is_known(dependency) {
                return Err(ScheduleError::UnknownDependency {
                    job: job.id(),
                    dependency,
                }
                .into());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(JobloopError::DependencyCycle(format!(
            "cycle detected among submitted jobs involving {}",
            cycle.node_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Step, WorkRegistry};

    fn job(id: u128, deps: &[u128]) -> Job {
        let mut registry = WorkRegistry::new();
        registry.register_fn("noop", |_| {
            Ok(Box::new(|| -> anyhow::Result<Step> { Ok(Step::Done) }))
        });
        let mut builder = Job::builder("noop").id(JobId::from_u128(id));
        for dep in deps {
            builder = builder.depends_on(JobId::from_u128(*dep));
        }
        builder.build(&registry).unwrap()
    }

    #[test]
    fn accepts_forward_and_known_dependencies() {
        let batch = [job(1, &[2]), job(2, &[]), job(3, &[42])];
        let known = |id: JobId| id == JobId::from_u128(42);
        assert!(validate_batch(&batch, known).is_ok());
    }

    #[test]
    fn unknown_dependency_fails_fast() {
        let batch = [job(1, &[9])];
        match validate_batch(&batch, |_| false) {
            Err(JobloopError::Schedule(ScheduleError::UnknownDependency { job, dependency })) => {
                assert_eq!(job, JobId::from_u128(1));
                assert_eq!(dependency, JobId::from_u128(9));
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn detects_cycles() {
        let batch = [job(1, &[3]), job(2, &[1]), job(3, &[2])];
        let err = validate_batch(&batch, |_| false).unwrap_err();
        assert!(matches!(err, JobloopError::DependencyCycle(msg) if msg.contains("cycle detected")));
    }

    #[test]
    fn detects_self_dependency() {
        let batch = [job(1, &[1])];
        let err = validate_batch(&batch, |_| true).unwrap_err();
        assert!(matches!(err, JobloopError::DependencyCycle(msg) if msg.contains("itself")));
    }
}
