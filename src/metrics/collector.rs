//! Request and check metrics collection
//!
//! Provides latency percentiles, failure rates per request name and check
//! pass rates.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::http::{HttpError, HttpResponse};
use crate::models::{CheckResult, CheckTally};

/// Latency percentiles (p50, p90, p95, p99, p999)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
}

impl Percentiles {
    /// Calculate percentiles from sorted latencies (in milliseconds)
    pub fn from_sorted(latencies: &[f64]) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }

        Self {
            p50: percentile(latencies, 50.0),
            p90: percentile(latencies, 90.0),
            p95: percentile(latencies, 95.0),
            p99: percentile(latencies, 99.0),
            p999: percentile(latencies, 99.9),
        }
    }
}

/// Calculate percentile value from sorted array
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let fraction = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
    }
}

fn sorted_copy(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Latency statistics
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub percentiles: Percentiles,
    pub count: usize,
}

impl LatencyStats {
    /// Calculate statistics from latency samples (in milliseconds)
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let sorted = sorted_copy(samples);

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let sum: f64 = sorted.iter().sum();
        let mean = sum / sorted.len() as f64;

        let variance: f64 =
            sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / sorted.len() as f64;

        Self {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
            percentiles: Percentiles::from_sorted(&sorted),
            count: sorted.len(),
        }
    }

    /// Format as summary string
    pub fn format_summary(&self) -> String {
        format!(
            "avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
            self.mean,
            self.min,
            self.percentiles.p50,
            self.max,
            self.percentiles.p90,
            self.percentiles.p95
        )
    }
}

/// Error statistics
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorStats {
    pub connection_errors: u64,
    pub timeout_errors: u64,
    /// HTTP 4xx responses
    pub client_errors: u64,
    /// HTTP 5xx responses
    pub server_errors: u64,
    pub other_errors: u64,
}

impl ErrorStats {
    pub fn total(&self) -> u64 {
        self.connection_errors
            + self.timeout_errors
            + self.client_errors
            + self.server_errors
            + self.other_errors
    }

    /// Record an error by status code or type
    pub fn record(&mut self, status_code: Option<u16>, is_timeout: bool, is_connection_error: bool) {
        if is_timeout {
            self.timeout_errors += 1;
        } else if is_connection_error {
            self.connection_errors += 1;
        } else if let Some(code) = status_code {
            match code {
                400..=499 => self.client_errors += 1,
                500..=599 => self.server_errors += 1,
                _ => self.other_errors += 1,
            }
        } else {
            self.other_errors += 1;
        }
    }
}

/// One HTTP request as seen by the metrics pipeline
#[derive(Clone, Debug)]
pub struct RequestSample {
    /// Logical request name (the `name` tag)
    pub name: String,
    /// Status code; `None` when no response arrived
    pub status: Option<u16>,
    pub duration_ms: Option<f64>,
    pub failed: bool,
    pub is_timeout: bool,
    pub is_connection_error: bool,
}

impl RequestSample {
    /// Build a sample from the outcome of `HttpClient::send`
    pub fn from_result(name: impl Into<String>, result: &Result<HttpResponse>) -> Self {
        match result {
            Ok(resp) => Self {
                name: name.into(),
                status: Some(resp.status_code),
                duration_ms: Some(resp.duration_ms),
                failed: !resp.is_expected(),
                is_timeout: false,
                is_connection_error: false,
            },
            Err(e) => {
                let kind = e.downcast_ref::<HttpError>();
                Self {
                    name: name.into(),
                    status: None,
                    duration_ms: None,
                    failed: true,
                    is_timeout: matches!(kind, Some(HttpError::Timeout(_))),
                    is_connection_error: matches!(kind, Some(HttpError::ConnectionRefused(_))),
                }
            }
        }
    }
}

/// Accumulated samples for one request name
#[derive(Clone, Debug, Default)]
struct RequestSeries {
    durations: Vec<f64>,
    total: u64,
    failed: u64,
}

/// Summary of one request series
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RequestSummary {
    pub count: u64,
    pub failed: u64,
    /// `http_req_failed` rate (0.0 - 1.0)
    pub fail_rate: f64,
    pub latency: LatencyStats,
}

impl RequestSummary {
    fn new(count: u64, failed: u64, durations: &[f64]) -> Self {
        Self {
            count,
            failed,
            fail_rate: ratio(failed, count),
            latency: LatencyStats::from_samples(durations),
        }
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Point-in-time view of every collected metric
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub duration_secs: f64,
    /// Requests per second over the run
    pub rps: f64,
    /// All requests
    pub requests: RequestSummary,
    /// Requests grouped by `name` tag
    pub by_name: BTreeMap<String, RequestSummary>,
    /// Check tallies by check name
    pub checks: BTreeMap<String, CheckTally>,
    /// Overall check pass rate (0.0 - 1.0)
    pub check_rate: f64,
    pub errors: ErrorStats,
}

impl MetricsSnapshot {
    pub fn checks_passed(&self) -> u64 {
        self.checks.values().map(|t| t.passes).sum()
    }

    pub fn checks_total(&self) -> u64 {
        self.checks.values().map(|t| t.total()).sum()
    }
}

/// Collects request samples and check results for a run
pub struct MetricsCollector {
    start_time: Instant,
    series: BTreeMap<String, RequestSeries>,
    checks: BTreeMap<String, CheckTally>,
    errors: ErrorStats,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            series: BTreeMap::new(),
            checks: BTreeMap::new(),
            errors: ErrorStats::default(),
        }
    }

    /// Record one request
    pub fn record_request(&mut self, sample: &RequestSample) {
        let series = self.series.entry(sample.name.clone()).or_default();
        series.total += 1;
        if let Some(duration) = sample.duration_ms {
            series.durations.push(duration);
        }
        if sample.failed {
            series.failed += 1;
            self.errors
                .record(sample.status, sample.is_timeout, sample.is_connection_error);
        }
    }

    /// Record one check outcome
    pub fn record_check(&mut self, check: &CheckResult) {
        self.checks
            .entry(check.name.clone())
            .or_default()
            .record(check.status);
    }

    /// Request count and failure count, optionally restricted to one name
    pub fn request_counts(&self, name: Option<&str>) -> (u64, u64) {
        self.series_matching(name)
            .fold((0, 0), |(total, failed), s| (total + s.total, failed + s.failed))
    }

    /// Sorted durations, optionally restricted to one name
    pub fn durations(&self, name: Option<&str>) -> Vec<f64> {
        let all: Vec<f64> = self
            .series_matching(name)
            .flat_map(|s| s.durations.iter().copied())
            .collect();
        sorted_copy(&all)
    }

    /// Pass and total counts, optionally restricted to one check name
    pub fn check_counts(&self, check: Option<&str>) -> (u64, u64) {
        self.checks
            .iter()
            .filter(|(name, _)| check.map_or(true, |c| c == name.as_str()))
            .fold((0, 0), |(passes, total), (_, t)| {
                (passes + t.passes, total + t.total())
            })
    }

    fn series_matching<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> impl Iterator<Item = &'a RequestSeries> + 'a {
        self.series
            .iter()
            .filter(move |(n, _)| name.map_or(true, |wanted| wanted == n.as_str()))
            .map(|(_, s)| s)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let duration_secs = self.elapsed().as_secs_f64();
        let (total, failed) = self.request_counts(None);
        let (passes, checks_total) = self.check_counts(None);

        MetricsSnapshot {
            duration_secs,
            rps: if duration_secs > 0.0 {
                total as f64 / duration_secs
            } else {
                0.0
            },
            requests: RequestSummary::new(total, failed, &self.durations(None)),
            by_name: self
                .series
                .iter()
                .map(|(name, s)| {
                    (
                        name.clone(),
                        RequestSummary::new(s.total, s.failed, &s.durations),
                    )
                })
                .collect(),
            checks: self.checks.clone(),
            check_rate: ratio(passes, checks_total),
            errors: self.errors.clone(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle through which virtual users record metrics
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<MetricsCollector>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn request(&self, sample: RequestSample) {
        self.inner.lock().await.record_request(&sample);
    }

    /// Record a check and return whether it passed
    pub async fn check(&self, check: CheckResult) -> bool {
        let passed = check.passed();
        if !passed {
            debug!("Check failed: {check}");
        }
        self.inner.lock().await.record_check(&check);
        passed
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Run a closure against the locked collector
    pub async fn with_collector<R>(&self, f: impl FnOnce(&MetricsCollector) -> R) -> R {
        let collector = self.inner.lock().await;
        f(&collector)
    }
}
