#![allow(dead_code)]

use std::collections::BTreeMap;

use jobloop::config::{ConfigFile, JobConfig, RawConfigFile, SchedulerSection};
use serde_json::Value;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                scheduler: SchedulerSection::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.config.scheduler.pool_size = pool_size;
        self
    }

    pub fn with_snapshot_path(mut self, path: &str) -> Self {
        self.config.scheduler.snapshot_path = path.to_string();
        self
    }

    /// The raw model, for tests that expect validation to fail.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(work: &str) -> Self {
        Self {
            job: JobConfig {
                work: work.to_string(),
                args: Value::Null,
                after: vec![],
                max_running_time: None,
                max_restarts: 0,
                start_after: None,
            },
        }
    }

    pub fn args(mut self, args: Value) -> Self {
        self.job.args = args;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.job.after.push(dep.to_string());
        self
    }

    pub fn max_running_time(mut self, secs: f64) -> Self {
        self.job.max_running_time = Some(secs);
        self
    }

    pub fn max_restarts(mut self, max: u32) -> Self {
        self.job.max_restarts = max;
        self
    }

    pub fn start_after(mut self, secs: f64) -> Self {
        self.job.start_after = Some(secs);
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}
