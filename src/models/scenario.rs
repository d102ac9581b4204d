//! Scenario options: how many virtual users run, and for how long

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Executor used to schedule iterations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorKind {
    /// Each VU runs a fixed number of iterations
    #[default]
    PerVuIterations,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::PerVuIterations => write!(f, "per-vu-iterations"),
        }
    }
}

/// Declarative scenario block
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOptions {
    /// Scenario name shown in reports
    pub name: String,

    #[serde(default)]
    pub executor: ExecutorKind,

    /// Number of virtual users
    pub vus: u32,

    /// Iterations per virtual user
    pub iterations: u32,

    /// No iteration starts after this much time has elapsed
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,

    /// Extra time granted to running iterations after `max_duration`
    #[serde(with = "humantime_serde", default)]
    pub graceful_stop: Duration,
}

impl ScenarioOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executor: ExecutorKind::PerVuIterations,
            vus: 1,
            iterations: 1,
            max_duration: Duration::from_secs(600),
            graceful_stop: Duration::from_secs(30),
        }
    }

    /// Single login request
    pub fn login_check() -> Self {
        Self {
            max_duration: Duration::from_secs(1),
            ..Self::new("one_loop_per_user")
        }
    }

    /// Simultaneous users each running the notification flow once
    pub fn notification_flow() -> Self {
        Self {
            max_duration: Duration::from_secs(30),
            graceful_stop: Duration::from_secs(30),
            ..Self::new("simultaneous_users")
        }
    }

    pub fn with_vus(mut self, vus: u32) -> Self {
        self.vus = vus;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    /// Total iterations when no deadline interferes
    pub fn planned_iterations(&self) -> u64 {
        self.vus as u64 * self.iterations as u64
    }
}

impl fmt::Display for ScenarioOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} VU(s) x {} iteration(s) [{}, max {}, graceful stop {}]",
            self.name,
            self.vus,
            self.iterations,
            self.executor,
            humantime::format_duration(self.max_duration),
            humantime::format_duration(self.graceful_stop)
        )
    }
}
