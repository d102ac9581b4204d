//! Data models for the load-test workloads
//!
//! This module contains all data structures used throughout the application.

mod check;
mod credential;
mod report;
mod scenario;

pub use check::{CheckResult, CheckTally};
pub use credential::{Credential, CredentialSet};
pub use report::RunReport;
pub use scenario::ScenarioOptions;
