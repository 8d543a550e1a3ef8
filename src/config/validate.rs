// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{JobloopError, Result};

/// Largest accepted `max_running_time` / `start_after`: one hundred years.
const MAX_SECONDS: f64 = 100.0 * 365.25 * 24.0 * 3600.0;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = JobloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.scheduler, raw.job))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_scheduler_section(cfg)?;
    validate_job_limits(cfg)?;
    validate_job_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(JobloopError::ConfigError(
            "config must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.pool_size == 0 {
        return Err(JobloopError::ConfigError(
            "[scheduler].pool_size must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.scheduler.snapshot_path.trim().is_empty() {
        return Err(JobloopError::ConfigError(
            "[scheduler].snapshot_path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_job_limits(cfg: &RawConfigFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        if job.work.trim().is_empty() {
            return Err(JobloopError::ConfigError(format!(
                "job '{}' must name a `work` kind",
                name
            )));
        }
        for (field, value) in [
            ("max_running_time", job.max_running_time),
            ("start_after", job.start_after),
        ] {
            if let Some(secs) = value {
                if !secs.is_finite() || secs < 0.0 {
                    return Err(JobloopError::ConfigError(format!(
                        "job '{}' has invalid `{}` ({}); expected a non-negative number of seconds",
                        name, field, secs
                    )));
                }
                if secs > MAX_SECONDS {
                    return Err(JobloopError::ConfigError(format!(
                        "job '{}' has `{}` of {} seconds; at most {} is accepted",
                        name, field, secs, MAX_SECONDS
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_job_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        for dep in job.after.iter() {
            if dep == name {
                return Err(JobloopError::ConfigError(format!(
                    "job '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.job.contains_key(dep) {
                return Err(JobloopError::ConfigError(format!(
                    "job '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> job.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.job.keys() {
        graph.add_node(name.as_str());
    }

    for (name, job) in cfg.job.iter() {
        for dep in job.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(JobloopError::DependencyCycle(format!(
            "cycle detected in job plan involving job '{}'",
            cycle.node_id()
        ))),
    }
}
