// src/workloads/files.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{ensure, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::fs::{FileSystem, RealFileSystem};
use crate::job::{Step, WorkUnit};

#[derive(Debug, Deserialize)]
struct FilesArgs {
    #[serde(default = "default_dir")]
    dir: PathBuf,
    #[serde(default = "default_count")]
    count: u32,
    #[serde(default)]
    cleanup: bool,
}

fn default_dir() -> PathBuf {
    PathBuf::from("jobloop-files")
}

fn default_count() -> u32 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Write(u32),
    Read(u32),
    Cleanup,
    Done,
}

/// Writes `count` files into `dir` (one per resume), reads each one back
/// and checks its contents, then optionally removes them in a final step.
#[derive(Debug)]
pub struct FilesWork {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    count: u32,
    cleanup: bool,
    phase: Phase,
}

impl FilesWork {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>, count: u32, cleanup: bool) -> Self {
        Self {
            fs,
            dir: dir.into(),
            count,
            cleanup,
            phase: Phase::Write(0),
        }
    }

    /// `{ "dir": "out", "count": 5, "cleanup": true }` on the real filesystem.
    pub fn from_args(args: &Value) -> Result<Self> {
        let args: FilesArgs = super::parse_args("files", args)?;
        Ok(Self::new(
            Arc::new(RealFileSystem),
            args.dir,
            args.count,
            args.cleanup,
        ))
    }

    fn path(&self, i: u32) -> PathBuf {
        self.dir.join(format!("file_{i}.txt"))
    }

    fn contents(i: u32) -> String {
        format!("This is file {i}")
    }

    fn after_reads(&self) -> Phase {
        if self.cleanup { Phase::Cleanup } else { Phase::Done }
    }
}

impl WorkUnit for FilesWork {
    fn advance(&mut self) -> Result<Step> {
        match self.phase {
            Phase::Write(i) if i < self.count => {
                self.fs.write(&self.path(i), Self::contents(i).as_bytes())?;
                self.phase = Phase::Write(i + 1);
            }
            Phase::Write(_) => {
                self.phase = Phase::Read(0);
                return self.advance();
            }
            Phase::Read(i) if i < self.count => {
                let path = self.path(i);
                let found = self.fs.read_to_string(&path)?;
                ensure!(
                    found == Self::contents(i),
                    "unexpected contents in {:?}: {:?}",
                    path,
                    found
                );
                self.phase = Phase::Read(i + 1);
            }
            Phase::Read(_) => {
                self.phase = self.after_reads();
                return self.advance();
            }
            Phase::Cleanup => {
                for i in 0..self.count {
                    self.fs.remove_file(&self.path(i))?;
                }
                self.phase = Phase::Done;
            }
            Phase::Done => return Ok(Step::Done),
        }
        Ok(Step::More)
    }
}
