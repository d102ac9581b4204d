//! Metrics and thresholds
//!
//! Collects tagged request samples and check outcomes from every virtual
//! user, and evaluates declarative thresholds against them at the end of a
//! run.

mod collector;
mod threshold;

pub use collector::{MetricsCollector, MetricsSnapshot, Recorder, RequestSample, RequestSummary};
pub use threshold::{ThresholdOutcome, ThresholdSet};
