//! Declarative pass/fail thresholds
//!
//! Thresholds are written as `selector -> [expression]`, for example
//! `http_req_failed{name:login}: ["rate<0.1"]` or
//! `http_req_duration: ["p(95)<800"]`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::collector::{percentile, MetricsCollector};

/// Threshold parsing errors
#[derive(Error, Debug, PartialEq)]
pub enum ThresholdError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Invalid tag filter in '{0}', expected {{tag:value}}")]
    InvalidTagFilter(String),

    #[error("Unsupported tag '{tag}' for metric {metric}")]
    UnsupportedTag { metric: String, tag: String },

    #[error("Unknown aggregation: {0}")]
    UnknownAggregation(String),

    #[error("Aggregation {aggregation} is not available for metric {metric}")]
    UnsupportedAggregation { metric: String, aggregation: String },

    #[error("Missing comparison operator in '{0}'")]
    MissingOperator(String),

    #[error("Invalid threshold bound in '{0}'")]
    InvalidBound(String),
}

/// Built-in metrics thresholds can refer to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    /// Counter of issued requests
    HttpReqs,
    /// Rate of failed requests
    HttpReqFailed,
    /// Trend of request durations in ms
    HttpReqDuration,
    /// Rate of passed checks
    Checks,
}

impl MetricKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "http_reqs" => Some(MetricKind::HttpReqs),
            "http_req_failed" => Some(MetricKind::HttpReqFailed),
            "http_req_duration" => Some(MetricKind::HttpReqDuration),
            "checks" => Some(MetricKind::Checks),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::HttpReqs => "http_reqs",
            MetricKind::HttpReqFailed => "http_req_failed",
            MetricKind::HttpReqDuration => "http_req_duration",
            MetricKind::Checks => "checks",
        }
    }

    fn supported_tag(&self) -> &'static str {
        match self {
            MetricKind::Checks => "check",
            _ => "name",
        }
    }

    fn supports(&self, aggregation: &Aggregation) -> bool {
        match self {
            MetricKind::HttpReqs => matches!(aggregation, Aggregation::Count | Aggregation::Rate),
            MetricKind::HttpReqFailed | MetricKind::Checks => {
                matches!(aggregation, Aggregation::Rate)
            }
            MetricKind::HttpReqDuration => !matches!(aggregation, Aggregation::Rate),
        }
    }
}

/// Metric plus optional `{tag:value}` filter
#[derive(Clone, Debug, PartialEq)]
pub struct MetricSelector {
    pub metric: MetricKind,
    pub tag_value: Option<String>,
}

impl MetricSelector {
    pub fn parse(s: &str) -> Result<Self, ThresholdError> {
        let s = s.trim();
        let (name, filter) = match s.find('{') {
            Some(open) => {
                let inner = s[open + 1..]
                    .strip_suffix('}')
                    .ok_or_else(|| ThresholdError::InvalidTagFilter(s.to_string()))?;
                (&s[..open], Some(inner))
            }
            None => (s, None),
        };

        let metric = MetricKind::from_str(name.trim())
            .ok_or_else(|| ThresholdError::UnknownMetric(name.trim().to_string()))?;

        let tag_value = match filter {
            None => None,
            Some(inner) => {
                let (tag, value) = inner
                    .split_once(':')
                    .ok_or_else(|| ThresholdError::InvalidTagFilter(s.to_string()))?;
                let tag = tag.trim();
                if tag != metric.supported_tag() {
                    return Err(ThresholdError::UnsupportedTag {
                        metric: metric.name().to_string(),
                        tag: tag.to_string(),
                    });
                }
                Some(value.trim().to_string())
            }
        };

        Ok(Self { metric, tag_value })
    }
}

impl fmt::Display for MetricSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag_value {
            Some(value) => write!(
                f,
                "{}{{{}:{}}}",
                self.metric.name(),
                self.metric.supported_tag(),
                value
            ),
            None => write!(f, "{}", self.metric.name()),
        }
    }
}

/// How samples are reduced to the single value being compared
#[derive(Clone, Debug, PartialEq)]
pub enum Aggregation {
    Rate,
    Count,
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
}

impl Aggregation {
    pub fn parse(s: &str) -> Result<Self, ThresholdError> {
        let s = s.trim();
        match s {
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            _ => s
                .strip_prefix("p(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|p| p.trim().parse::<f64>().ok())
                .filter(|p| (0.0..=100.0).contains(p))
                .map(Aggregation::Percentile)
                .ok_or_else(|| ThresholdError::UnknownAggregation(s.to_string())),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Rate => write!(f, "rate"),
            Aggregation::Count => write!(f, "count"),
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Med => write!(f, "med"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    // Two-character operators first so `<=` is not read as `<`.
    const OPERATORS: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => (observed - bound).abs() < f64::EPSILON,
            Comparison::Ne => (observed - bound).abs() >= f64::EPSILON,
        }
    }
}

/// A parsed threshold
#[derive(Clone, Debug, PartialEq)]
pub struct Threshold {
    pub selector: MetricSelector,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
    /// Expression as written
    pub expression: String,
}

impl Threshold {
    pub fn parse(selector: &str, expression: &str) -> Result<Self, ThresholdError> {
        let selector = MetricSelector::parse(selector)?;
        let expr = expression.trim();

        let (pos, token, comparison) = Comparison::OPERATORS
            .iter()
            .filter_map(|(token, cmp)| expr.find(token).map(|pos| (pos, *token, *cmp)))
            .min_by_key(|(pos, token, _)| (*pos, std::cmp::Reverse(token.len())))
            .ok_or_else(|| ThresholdError::MissingOperator(expr.to_string()))?;

        let aggregation = Aggregation::parse(&expr[..pos])?;
        if !selector.metric.supports(&aggregation) {
            return Err(ThresholdError::UnsupportedAggregation {
                metric: selector.metric.name().to_string(),
                aggregation: aggregation.to_string(),
            });
        }

        let bound = expr[pos + token.len()..]
            .trim()
            .parse::<f64>()
            .map_err(|_| ThresholdError::InvalidBound(expr.to_string()))?;

        Ok(Self {
            selector,
            aggregation,
            comparison,
            bound,
            expression: expr.to_string(),
        })
    }

    /// Reduce the collected samples to the value this threshold compares
    pub fn observe(&self, collector: &MetricsCollector) -> f64 {
        let tag = self.selector.tag_value.as_deref();
        match self.selector.metric {
            MetricKind::HttpReqs => {
                let (total, _) = collector.request_counts(tag);
                match self.aggregation {
                    Aggregation::Rate => {
                        let secs = collector.elapsed().as_secs_f64();
                        if secs > 0.0 {
                            total as f64 / secs
                        } else {
                            0.0
                        }
                    }
                    _ => total as f64,
                }
            }
            MetricKind::HttpReqFailed => {
                let (total, failed) = collector.request_counts(tag);
                if total == 0 {
                    0.0
                } else {
                    failed as f64 / total as f64
                }
            }
            MetricKind::Checks => {
                let (passes, total) = collector.check_counts(tag);
                if total == 0 {
                    0.0
                } else {
                    passes as f64 / total as f64
                }
            }
            MetricKind::HttpReqDuration => {
                let sorted = collector.durations(tag);
                if sorted.is_empty() {
                    return 0.0;
                }
                match self.aggregation {
                    Aggregation::Count => sorted.len() as f64,
                    Aggregation::Avg => sorted.iter().sum::<f64>() / sorted.len() as f64,
                    Aggregation::Min => sorted[0],
                    Aggregation::Max => sorted[sorted.len() - 1],
                    Aggregation::Med => percentile(&sorted, 50.0),
                    Aggregation::Percentile(p) => percentile(&sorted, p),
                    Aggregation::Rate => 0.0,
                }
            }
        }
    }

    pub fn evaluate(&self, collector: &MetricsCollector) -> ThresholdOutcome {
        let observed = self.observe(collector);
        ThresholdOutcome {
            selector: self.selector.to_string(),
            expression: self.expression.clone(),
            observed,
            passed: self.comparison.holds(observed, self.bound),
        }
    }
}

/// Result of evaluating one threshold
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub selector: String,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

impl fmt::Display for ThresholdOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = if self.passed { "✓" } else { "✗" };
        write!(
            f,
            "{symbol} {} '{}' (observed {:.4})",
            self.selector, self.expression, self.observed
        )
    }
}

/// All thresholds declared for a workload
#[derive(Clone, Debug, Default)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    /// Parse a `selector -> [expression]` map
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Result<Self, ThresholdError> {
        let thresholds = map
            .iter()
            .flat_map(|(selector, exprs)| exprs.iter().map(move |e| (selector, e)))
            .map(|(selector, expr)| Threshold::parse(selector, expr))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { thresholds })
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn evaluate(&self, collector: &MetricsCollector) -> Vec<ThresholdOutcome> {
        self.thresholds
            .iter()
            .map(|t| t.evaluate(collector))
            .collect()
    }
}
