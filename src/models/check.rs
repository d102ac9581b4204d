//! Named boolean checks evaluated against responses

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
}

impl CheckStatus {
    pub fn from_bool(ok: bool) -> Self {
        if ok {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "✓",
            CheckStatus::Fail => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckStatus::Pass)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Result of evaluating one named check
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: Option<String>,
}

impl CheckResult {
    pub fn new(name: impl Into<String>, ok: bool) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::from_bool(ok),
            message: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Fail,
            message: Some(message.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.status.is_success()
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.symbol(), self.name)?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Aggregated pass/fail counts for one check name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckTally {
    pub passes: u64,
    pub fails: u64,
}

impl CheckTally {
    pub fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.passes += 1,
            CheckStatus::Fail => self.fails += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Pass rate in 0.0 - 1.0; zero when nothing was evaluated
    pub fn rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.passes as f64 / self.total() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_creation() {
        let ok = CheckResult::new("status is 200", true);
        assert!(ok.passed());
        assert_eq!(ok.to_string(), "✓ status is 200");

        let bad = CheckResult::fail("login succeeded", "status 401");
        assert!(!bad.passed());
        assert_eq!(bad.to_string(), "✗ login succeeded - status 401");
    }

    #[test]
    fn test_tally_rate() {
        let mut tally = CheckTally::default();
        assert_eq!(tally.rate(), 0.0);

        tally.record(CheckStatus::Pass);
        tally.record(CheckStatus::Pass);
        tally.record(CheckStatus::Pass);
        tally.record(CheckStatus::Fail);

        assert_eq!(tally.total(), 4);
        assert!((tally.rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&CheckStatus::Fail).unwrap();
        assert_eq!(json, "\"fail\"");
    }
}
