// src/workloads/sleep.rs

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::job::{Step, WorkUnit};

#[derive(Debug, Deserialize)]
struct SleepArgs {
    #[serde(default = "default_steps")]
    steps: u32,
    #[serde(default)]
    step_ms: u64,
}

fn default_steps() -> u32 {
    1
}

/// Sleeps `step` on each of `steps` resumes; the next resume is `Done`.
#[derive(Debug, Clone)]
pub struct SleepWork {
    remaining: u32,
    step: Duration,
}

impl SleepWork {
    pub fn new(steps: u32, step: Duration) -> Self {
        Self {
            remaining: steps,
            step,
        }
    }

    /// `{ "steps": 3, "step_ms": 500 }`
    pub fn from_args(args: &Value) -> Result<Self> {
        let args: SleepArgs = super::parse_args("sleep", args)?;
        Ok(Self::new(args.steps, Duration::from_millis(args.step_ms)))
    }
}

impl WorkUnit for SleepWork {
    fn advance(&mut self) -> Result<Step> {
        if self.remaining == 0 {
            return Ok(Step::Done);
        }
        std::thread::sleep(self.step);
        self.remaining -= 1;
        Ok(Step::More)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn three_steps_then_done() {
        let mut work = SleepWork::from_args(&json!({ "steps": 3 })).unwrap();
        for _ in 0..3 {
            assert_eq!(work.advance().unwrap(), Step::More);
        }
        assert_eq!(work.advance().unwrap(), Step::Done);
        assert_eq!(work.advance().unwrap(), Step::Done);
    }

    #[test]
    fn null_args_mean_one_instant_step() {
        let mut work = SleepWork::from_args(&Value::Null).unwrap();
        assert_eq!(work.advance().unwrap(), Step::More);
        assert_eq!(work.advance().unwrap(), Step::Done);
    }

    #[test]
    fn rejects_bad_args() {
        let err = SleepWork::from_args(&json!({ "steps": "many" })).unwrap_err();
        assert!(err.to_string().contains("'sleep'"));
    }
}
