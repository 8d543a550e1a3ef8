// src/config/mod.rs

//! Job plan configuration (`Jobloop.toml`).
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan from disk (`loader.rs`).
//! - Validate basic invariants like dependency correctness (`validate.rs`).
//! - Turn a validated plan into schedulable jobs (`plan.rs`).

pub mod loader;
pub mod model;
pub mod plan;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, JobConfig, RawConfigFile, SchedulerSection};
pub use plan::{admission_order, build_jobs};
