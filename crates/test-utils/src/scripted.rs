#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use jobloop::job::{Job, Step, WorkRegistry, WorkUnit};
use jobloop::types::JobId;
use serde_json::{json, Value};

/// Shared, ordered log of every resume performed by scripted work units.
///
/// Each entry is `"<label>#<attempt>"`, attempts counted from 1.
#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Labels only, in resume order.
    pub fn labels(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|e| e.split('#').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn count(&self, label: &str) -> usize {
        self.labels().iter().filter(|l| *l == label).count()
    }

    /// Position of the first resume of `label`.
    pub fn first(&self, label: &str) -> Option<usize> {
        self.labels().iter().position(|l| l == label)
    }

    /// Position of the last resume of `label`.
    pub fn last(&self, label: &str) -> Option<usize> {
        self.labels().iter().rposition(|l| l == label)
    }

    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }
}

/// Work unit driven by its arguments:
///
/// - `label`: name written to the trace
/// - `steps`: resumes that return `More` before the unit is exhausted
/// - `step_ms`: sleep performed by every resume
/// - `fail_on`: attempts (1-based) that return an error
/// - `fail_always`: every attempt returns an error
pub struct ScriptedWork {
    trace: Trace,
    label: String,
    steps: u64,
    step: Duration,
    fail_on: Vec<u64>,
    fail_always: bool,
    done: u64,
    attempts: u64,
}

impl ScriptedWork {
    fn from_args(trace: Trace, args: &Value) -> Self {
        Self {
            trace,
            label: args["label"].as_str().unwrap_or("job").to_string(),
            steps: args["steps"].as_u64().unwrap_or(1),
            step: Duration::from_millis(args["step_ms"].as_u64().unwrap_or(0)),
            fail_on: args["fail_on"]
                .as_array()
                .map(|a| a.iter().filter_map(Value::as_u64).collect())
                .unwrap_or_default(),
            fail_always: args["fail_always"].as_bool().unwrap_or(false),
            done: 0,
            attempts: 0,
        }
    }
}

impl WorkUnit for ScriptedWork {
    fn advance(&mut self) -> Result<Step> {
        self.attempts += 1;
        self.trace.push(format!("{}#{}", self.label, self.attempts));

        if !self.step.is_zero() {
            std::thread::sleep(self.step);
        }
        if self.fail_always || self.fail_on.contains(&self.attempts) {
            bail!("{} failed on attempt {}", self.label, self.attempts);
        }
        if self.done >= self.steps {
            return Ok(Step::Done);
        }
        self.done += 1;
        Ok(Step::More)
    }
}

/// Registry with the built-in kinds plus `scripted`, logging into `trace`.
pub fn scripted_registry(trace: &Trace) -> WorkRegistry {
    let mut registry = WorkRegistry::with_builtins();
    let trace = trace.clone();
    registry.register_fn("scripted", move |args| {
        Ok(Box::new(ScriptedWork::from_args(trace.clone(), args)))
    });
    registry
}

/// Deterministic id for a test job label.
pub fn id(label: &str) -> JobId {
    JobId::from_name(label)
}

/// A `scripted` job with `steps` productive resumes.
pub fn scripted(registry: &WorkRegistry, label: &str, steps: u64) -> Job {
    scripted_with(registry, label, json!({ "steps": steps }), |b| b)
}

/// A `scripted` job with extra arguments and builder tweaks.
pub fn scripted_with(
    registry: &WorkRegistry,
    label: &str,
    extra: Value,
    tweak: impl FnOnce(jobloop::job::JobBuilder) -> jobloop::job::JobBuilder,
) -> Job {
    let mut args = json!({ "label": label });
    if let (Some(args), Some(extra)) = (args.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            args.insert(k.clone(), v.clone());
        }
    }
    tweak(Job::builder("scripted").id(id(label)).args(args))
        .build(registry)
        .expect("scripted job builds")
}
