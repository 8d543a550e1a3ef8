// src/workloads/mod.rs

//! Built-in demo work units.
//!
//! These are interchangeable example workloads used by the CLI and tests:
//! - [`sleep`]: a fixed number of steps, each sleeping for a while.
//! - [`files`]: writes a set of files one per step, then reads them back.
//! - [`fail`]: performs some steps and then faults on every resume.

pub mod fail;
pub mod files;
pub mod sleep;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::job::WorkRegistry;

pub use fail::FailWork;
pub use files::FilesWork;
pub use sleep::SleepWork;

/// Register `sleep`, `files` and `fail` on `registry`.
pub fn register_builtins(registry: &mut WorkRegistry) {
    registry.register_fn("sleep", |args| Ok(Box::new(SleepWork::from_args(args)?)));
    registry.register_fn("files", |args| Ok(Box::new(FilesWork::from_args(args)?)));
    registry.register_fn("fail", |args| Ok(Box::new(FailWork::from_args(args)?)));
}

/// Deserialize workload arguments; `null` means "all defaults".
pub(crate) fn parse_args<T: DeserializeOwned>(kind: &str, args: &Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args.clone()
    };
    serde_json::from_value(args).with_context(|| format!("invalid arguments for '{kind}' work"))
}
