// src/workloads/fail.rs

use anyhow::{bail, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::job::{Step, WorkUnit};

#[derive(Debug, Deserialize)]
struct FailArgs {
    #[serde(default)]
    after_steps: u32,
    #[serde(default = "default_message")]
    message: String,
}

fn default_message() -> String {
    "requested failure".to_string()
}

/// Performs `after_steps` steps, then faults on every later resume.
#[derive(Debug, Clone)]
pub struct FailWork {
    healthy_steps: u32,
    message: String,
    attempts: u32,
}

impl FailWork {
    pub fn new(after_steps: u32, message: impl Into<String>) -> Self {
        Self {
            healthy_steps: after_steps,
            message: message.into(),
            attempts: 0,
        }
    }

    /// `{ "after_steps": 1, "message": "upstream unavailable" }`
    pub fn from_args(args: &Value) -> Result<Self> {
        let args: FailArgs = super::parse_args("fail", args)?;
        Ok(Self::new(args.after_steps, args.message))
    }
}

impl WorkUnit for FailWork {
    fn advance(&mut self) -> Result<Step> {
        self.attempts += 1;
        if self.attempts <= self.healthy_steps {
            return Ok(Step::More);
        }
        bail!("{} (attempt {})", self.message, self.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn faults_after_healthy_steps() {
        let mut work = FailWork::from_args(&json!({ "after_steps": 1, "message": "nope" })).unwrap();
        assert_eq!(work.advance().unwrap(), Step::More);
        assert_eq!(work.advance().unwrap_err().to_string(), "nope (attempt 2)");
        assert_eq!(work.advance().unwrap_err().to_string(), "nope (attempt 3)");
    }
}
