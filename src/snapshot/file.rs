// src/snapshot/file.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{JobloopError, Result};
use crate::fs::{FileSystem, RealFileSystem};

use super::{JobRecord, SnapshotStore};

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "jobs.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    jobs: &'a [JobRecord],
}

#[derive(Deserialize)]
struct SnapshotIn {
    version: u32,
    jobs: Vec<JobRecord>,
}

/// Stores the queue as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(path, Arc::new(RealFileSystem))
    }

    pub fn with_fs(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&mut self, records: &[JobRecord]) -> Result<()> {
        let body = serde_json::to_vec_pretty(&SnapshotOut {
            version: FORMAT_VERSION,
            jobs: records,
        })?;
        self.fs.write_atomic(&self.path, &body)?;
        info!(path = ?self.path, jobs = records.len(), "snapshot written");
        Ok(())
    }

    fn load(&self) -> Result<Vec<JobRecord>> {
        if !self.fs.is_file(&self.path) {
            return Err(JobloopError::SnapshotError(format!(
                "no snapshot at {:?}",
                self.path
            )));
        }

        let body = self.fs.read_to_string(&self.path)?;
        let snapshot: SnapshotIn = serde_json::from_str(&body)?;
        if snapshot.version != FORMAT_VERSION {
            return Err(JobloopError::SnapshotError(format!(
                "unsupported snapshot version {} in {:?} (expected {})",
                snapshot.version, self.path, FORMAT_VERSION
            )));
        }

        debug!(path = ?self.path, jobs = snapshot.jobs.len(), "snapshot loaded");
        Ok(snapshot.jobs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::job::{TimeBudget, WorkTarget};
    use crate::types::{JobId, JobStatus};

    fn record(n: u128) -> JobRecord {
        let dep = JobId::from_u128(100);
        JobRecord {
            id: JobId::from_u128(n),
            target: WorkTarget::new("sleep", json!({ "steps": 2 })),
            start_at: None,
            running_time: Duration::from_millis(1500),
            max_running_time: TimeBudget::Limited(Duration::from_secs(3)),
            restarts: 1,
            max_restarts: 2,
            dependencies: vec![dep],
            dependency_statuses: BTreeMap::from([(dep, JobStatus::Finished)]),
            status: JobStatus::Paused,
        }
    }

    #[test]
    fn saves_and_loads_in_order() {
        let fs = MockFileSystem::new();
        let mut store = FileSnapshotStore::with_fs("state/jobs.json", Arc::new(fs.clone()));

        let records = vec![record(2), record(1)];
        store.save(&records).unwrap();

        assert!(fs.is_file(Path::new("state/jobs.json")));
        assert_eq!(store.load().unwrap(), records);
    }

    #[test]
    fn missing_snapshot_is_a_snapshot_error() {
        let store = FileSnapshotStore::with_fs("absent.json", Arc::new(MockFileSystem::new()));
        assert!(matches!(store.load(), Err(JobloopError::SnapshotError(_))));
    }

    #[test]
    fn rejects_unknown_version() {
        let fs = MockFileSystem::new();
        fs.add_file("jobs.json", r#"{ "version": 99, "jobs": [] }"#);
        let store = FileSnapshotStore::with_fs("jobs.json", Arc::new(fs));

        match store.load() {
            Err(JobloopError::SnapshotError(msg)) => assert!(msg.contains("version 99")),
            other => panic!("expected SnapshotError, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_snapshot_is_a_json_error() {
        let fs = MockFileSystem::new();
        fs.add_file("jobs.json", "not json");
        let store = FileSnapshotStore::with_fs("jobs.json", Arc::new(fs));

        assert!(matches!(store.load(), Err(JobloopError::JsonError(_))));
    }
}
