//! Stored run reports
//!
//! Persists finished runs as JSON under the platform data directory and
//! lists them back per workload.

mod storage;

pub use storage::{generate_run_id, ResultsStorage, RunInfo, StoredRun};
