//! Run report: everything a finished scenario produced

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ScenarioOptions;
use crate::metrics::{MetricsSnapshot, ThresholdOutcome};

/// Outcome of one scenario run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub id: String,
    pub workload: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub scenario: ScenarioOptions,
    pub iterations_completed: u64,
    pub iterations_interrupted: u64,
    pub metrics: MetricsSnapshot,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunReport {
    /// True when every declared threshold held
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|t| !t.passed)
    }

    /// Check pass rate as a percentage
    pub fn check_pass_rate(&self) -> f64 {
        self.metrics.check_rate * 100.0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}] - {}", self.workload, self.id, self.scenario)?;
        writeln!(
            f,
            "Iterations: {} complete, {} interrupted | Requests: {} | Checks: {}/{} ({:.1}%)",
            self.iterations_completed,
            self.iterations_interrupted,
            self.metrics.requests.count,
            self.metrics.checks_passed(),
            self.metrics.checks_total(),
            self.check_pass_rate()
        )?;
        for outcome in &self.thresholds {
            writeln!(f, "  {outcome}")?;
        }
        write!(
            f,
            "Result: {}",
            if self.passed() { "PASS" } else { "FAIL" }
        )
    }
}
