// src/dag/mod.rs

//! Dependency bookkeeping and the round-robin scheduler.
//!
//! - [`graph`] validates a batch of jobs (known dependencies, no cycles).
//! - [`index`] maps each job to the dependents waiting on it.
//! - [`scheduler`] owns the bounded queue and the run-loop.

pub mod graph;
pub mod index;
pub mod scheduler;
pub mod scheduler_step;

pub use graph::validate_batch;
pub use index::DependencyIndex;
pub use scheduler::{Scheduler, StopHandle};
pub use scheduler_step::{FaultKind, RunOutcome, SchedulerStep};
