// src/config/plan.rs

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::model::ConfigFile;
use crate::errors::{JobloopError, Result};
use crate::job::{Job, TimeBudget, WorkRegistry};
use crate::types::JobId;

/// Job names in admission order: every job after its dependencies, ties
/// broken by name.
pub fn admission_order(cfg: &ConfigFile) -> Result<Vec<&str>> {
    let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, job) in cfg.job.iter() {
        let deps: BTreeSet<&str> = job.after.iter().map(String::as_str).collect();
        pending.insert(name.as_str(), deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(pending.len());

    while let Some(name) = ready.pop_first() {
        order.push(name);
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(n) = pending.get_mut(dependent) {
                *n -= 1;
                if *n == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != pending.len() {
        let stuck = pending
            .keys()
            .find(|name| !order.contains(*name))
            .copied()
            .unwrap_or_default();
        return Err(JobloopError::DependencyCycle(format!(
            "cycle detected in job plan involving job '{}'",
            stuck
        )));
    }
    Ok(order)
}

/// `now` plus `delay` seconds, rounded to the millisecond.
fn start_time(name: &str, now: DateTime<Utc>, delay: f64) -> Result<DateTime<Utc>> {
    let invalid = || {
        JobloopError::ConfigError(format!(
            "job '{name}' has `start_after` of {delay} seconds, which is out of range"
        ))
    };
    let delay = Duration::try_from_secs_f64((delay * 1000.0).round() / 1000.0)
        .map_err(|_| invalid())?;
    let delay = TimeDelta::from_std(delay).map_err(|_| invalid())?;
    now.checked_add_signed(delay).ok_or_else(invalid)
}

/// Build the jobs of a validated plan, in admission order.
///
/// `start_after` offsets are taken from `now`.
pub fn build_jobs(
    cfg: &ConfigFile,
    registry: &WorkRegistry,
    now: DateTime<Utc>,
) -> Result<Vec<Job>> {
    let mut jobs = Vec::with_capacity(cfg.job.len());

    for name in admission_order(cfg)? {
        let job_cfg = &cfg.job[name];
        let budget = TimeBudget::try_from_secs_f64(job_cfg.max_running_time).map_err(|e| {
            JobloopError::ConfigError(format!("job '{name}' has invalid `max_running_time`: {e}"))
        })?;
        let mut builder = Job::builder(job_cfg.work.as_str())
            .id(JobId::from_name(name))
            .args(job_cfg.args.clone())
            .budget(budget)
            .max_restarts(job_cfg.max_restarts);

        if let Some(delay) = job_cfg.start_after {
            builder = builder.start_at(start_time(name, now, delay)?);
        }
        for dep in job_cfg.after.iter() {
            builder = builder.depends_on(JobId::from_name(dep));
        }

        let job = builder.build(registry).map_err(|err| match err {
            JobloopError::UnknownWork(kind) => {
                JobloopError::ConfigError(format!("job '{name}' uses unknown work kind '{kind}'"))
            }
            other => other,
        })?;
        jobs.push(job);
    }
    Ok(jobs)
}
