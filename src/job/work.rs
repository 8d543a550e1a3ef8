// src/job/work.rs

//! The suspendable work unit contract and the registry that builds units.
//!
//! A work unit is a lazily-advanced computation: every call to
//! [`WorkUnit::advance`] performs exactly one increment of work and reports
//! whether more remains. Units are built from a [`WorkTarget`] (a registered
//! kind plus JSON arguments) so that a job can be rebuilt after a restore.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::JobloopError;

/// Outcome of one resume of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One increment was performed and more work remains.
    More,
    /// The unit has no more steps.
    Done,
}

/// A cooperative unit of work resumed one step at a time.
///
/// Any error returned from `advance` is treated as a fault of the unit. A
/// unit that never returns blocks the whole scheduler; cooperation is part
/// of the contract.
///
/// Units are `Sync` so a job (and an error handing one back) can cross
/// threads and be wrapped in `anyhow::Error`.
pub trait WorkUnit: Send + Sync {
    fn advance(&mut self) -> Result<Step>;
}

impl<F> WorkUnit for F
where
    F: FnMut() -> Result<Step> + Send + Sync,
{
    fn advance(&mut self) -> Result<Step> {
        self()
    }
}

/// Which factory built a unit, and with which arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkTarget {
    pub kind: String,
    #[serde(default)]
    pub args: Value,
}

impl WorkTarget {
    pub fn new(kind: impl Into<String>, args: Value) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }
}

/// Builds fresh work units from JSON arguments.
pub trait WorkFactory: Send + Sync {
    fn build(&self, args: &Value) -> Result<Box<dyn WorkUnit>>;
}

impl<F> WorkFactory for F
where
    F: Fn(&Value) -> Result<Box<dyn WorkUnit>> + Send + Sync,
{
    fn build(&self, args: &Value) -> Result<Box<dyn WorkUnit>> {
        self(args)
    }
}

/// Registry of work kinds, keyed by name.
#[derive(Clone, Default)]
pub struct WorkRegistry {
    factories: BTreeMap<String, Arc<dyn WorkFactory>>,
}

impl fmt::Debug for WorkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the demo workloads (`sleep`, `files`, `fail`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::workloads::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, factory: impl WorkFactory + 'static) {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Closure flavour of [`register`](Self::register).
    pub fn register_fn<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn WorkUnit>> + Send + Sync + 'static,
    {
        self.register(kind, factory);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(|k| k.as_str())
    }

    /// Build a fresh unit for `target`.
    pub fn build(&self, target: &WorkTarget) -> crate::errors::Result<Box<dyn WorkUnit>> {
        let factory = self
            .factories
            .get(&target.kind)
            .ok_or_else(|| JobloopError::UnknownWork(target.kind.clone()))?;
        let unit = factory.build(&target.args).map_err(|e| {
            JobloopError::Other(e.context(format!("building work unit of kind '{}'", target.kind)))
        })?;
        Ok(unit)
    }
}
