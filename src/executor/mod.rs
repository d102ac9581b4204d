//! Scenario execution
//!
//! Drives a workload with the per-VU-iterations executor and produces a
//! [`RunReport`](crate::models::RunReport).

mod runner;

pub use runner::ScenarioRunner;
