//! Report formatters
//!
//! Table, one-line summary and JSON renderings of a [`RunReport`], plus
//! JSON/CSV export.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::metrics::RequestSummary;
use crate::models::{CheckTally, RunReport};
use crate::results::RunInfo;
use crate::utils::timer::format_ms;

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Summary,
    Json,
    JsonPretty,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            other => Err(format!(
                "unknown format '{other}' (expected table, summary, json or json-pretty)"
            )),
        }
    }
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Report formatter
pub struct ReportFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ReportFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colorize {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn rate_color(rate: f64) -> &'static str {
        if rate >= 99.0 {
            GREEN
        } else if rate >= 90.0 {
            YELLOW
        } else {
            RED
        }
    }

    /// Format a finished run
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_table(report),
            OutputFormat::Summary => self.format_summary(report),
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
        }
    }

    fn format_summary(&self, report: &RunReport) -> String {
        let verdict = if report.passed() {
            self.paint(GREEN, "PASS")
        } else {
            self.paint(RED, "FAIL")
        };
        format!(
            "{} [{}]: {} - {} iteration(s), {} request(s), checks {}/{} ({:.1}%) in {}",
            report.workload,
            report.id,
            verdict,
            report.iterations_completed,
            report.metrics.requests.count,
            report.metrics.checks_passed(),
            report.metrics.checks_total(),
            report.check_pass_rate(),
            format_ms(report.duration_ms)
        )
    }

    fn format_table(&self, report: &RunReport) -> String {
        let mut output = String::new();
        let rule = "═".repeat(78);

        output.push_str(&format!("\n{rule}\n"));
        output.push_str(&format!(" {} [{}]\n", report.workload, report.id));
        output.push_str(&format!(" {}\n", report.scenario));
        output.push_str(&format!(
            " Started {} | Duration {} | Iterations {} complete, {} interrupted\n",
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            format_ms(report.duration_ms),
            report.iterations_completed,
            report.iterations_interrupted
        ));
        output.push_str(&format!("{rule}\n"));

        output.push_str("\n Checks\n");
        output.push_str(&format!(" {}\n", "─".repeat(76)));
        for (name, tally) in &report.metrics.checks {
            output.push_str(&self.format_check_row(name, tally));
        }
        let rate = report.check_pass_rate();
        output.push_str(&format!(
            " checks: {}/{} passed ({})\n",
            report.metrics.checks_passed(),
            report.metrics.checks_total(),
            self.paint(Self::rate_color(rate), &format!("{rate:.1}%"))
        ));

        output.push_str("\n Requests\n");
        output.push_str(
            "┌──────────────┬───────┬────────┬──────────┬──────────┬──────────┬──────────┐\n",
        );
        output.push_str(
            "│ Name         │ Count │ Failed │ Avg (ms) │ Med (ms) │ P95 (ms) │ Max (ms) │\n",
        );
        output.push_str(
            "├──────────────┼───────┼────────┼──────────┼──────────┼──────────┼──────────┤\n",
        );
        for (name, summary) in &report.metrics.by_name {
            output.push_str(&self.format_request_row(name, summary));
        }
        output.push_str(
            "├──────────────┼───────┼────────┼──────────┼──────────┼──────────┼──────────┤\n",
        );
        output.push_str(&self.format_request_row("all", &report.metrics.requests));
        output.push_str(
            "└──────────────┴───────┴────────┴──────────┴──────────┴──────────┴──────────┘\n",
        );
        output.push_str(&format!(
            " {:.2} req/s | errors: {} ({} timeout, {} connection, {} 4xx, {} 5xx)\n",
            report.metrics.rps,
            report.metrics.errors.total(),
            report.metrics.errors.timeout_errors,
            report.metrics.errors.connection_errors,
            report.metrics.errors.client_errors,
            report.metrics.errors.server_errors
        ));

        if !report.thresholds.is_empty() {
            output.push_str("\n Thresholds\n");
            output.push_str(&format!(" {}\n", "─".repeat(76)));
            for outcome in &report.thresholds {
                let color = if outcome.passed { GREEN } else { RED };
                output.push_str(&format!(" {}\n", self.paint(color, &outcome.to_string())));
            }
        }

        let verdict = if report.passed() {
            self.paint(GREEN, "PASS")
        } else {
            self.paint(RED, "FAIL")
        };
        output.push_str(&format!("\n Result: {verdict}\n"));

        output
    }

    fn format_check_row(&self, name: &str, tally: &CheckTally) -> String {
        let (symbol, color) = if tally.fails == 0 {
            ("✓", GREEN)
        } else {
            ("✗", RED)
        };
        format!(
            " {} {:40} {:>5} ✓ {:>5} ✗ {:6.1}%\n",
            self.paint(color, symbol),
            name,
            tally.passes,
            tally.fails,
            tally.rate() * 100.0
        )
    }

    fn format_request_row(&self, name: &str, summary: &RequestSummary) -> String {
        let failed = format!("{:>6}", summary.failed);
        let failed = if summary.failed > 0 {
            self.paint(RED, &failed)
        } else {
            failed
        };
        format!(
            "│ {:12} │ {:>5} │ {} │ {:>8.2} │ {:>8.2} │ {:>8.2} │ {:>8.2} │\n",
            name,
            summary.count,
            failed,
            summary.latency.mean,
            summary.latency.percentiles.p50,
            summary.latency.percentiles.p95,
            summary.latency.max
        )
    }

    /// Format stored run listings
    pub fn format_runs(&self, runs: &[RunInfo]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(runs).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(runs).unwrap_or_default(),
            OutputFormat::Table | OutputFormat::Summary => {
                if runs.is_empty() {
                    return "No stored runs".to_string();
                }
                let mut output = String::new();
                output.push_str(&format!(
                    "{:22} {:14} {:20} {:>10} {:>8}  {}\n",
                    "RUN", "WORKLOAD", "STARTED", "ITERATIONS", "CHECKS", "RESULT"
                ));
                for run in runs {
                    let verdict = if run.passed {
                        self.paint(GREEN, "PASS")
                    } else {
                        self.paint(RED, "FAIL")
                    };
                    output.push_str(&format!(
                        "{:22} {:14} {:20} {:>10} {:>7.1}%  {}\n",
                        run.id,
                        run.workload,
                        run.started_at.format("%Y-%m-%d %H:%M:%S"),
                        run.iterations,
                        run.check_rate * 100.0,
                        verdict
                    ));
                }
                output
            }
        }
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Export format, chosen from the file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

/// Write `report` to `path` as JSON or CSV depending on the extension
pub fn export_report(report: &RunReport, path: &Path) -> Result<()> {
    let Some(format) = ExportFormat::from_extension(path) else {
        bail!(
            "Cannot export to {}: use a .json or .csv extension",
            path.display()
        );
    };

    match format {
        ExportFormat::Json => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), report)
                .context("Failed to write report")?;
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;

            writer.write_record([
                "kind", "name", "total", "failed", "rate", "avg_ms", "med_ms", "p95_ms", "max_ms",
            ])?;

            for (name, tally) in &report.metrics.checks {
                writer.write_record([
                    "check".to_string(),
                    name.clone(),
                    tally.total().to_string(),
                    tally.fails.to_string(),
                    format!("{:.4}", tally.rate()),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                ])?;
            }

            for (name, summary) in &report.metrics.by_name {
                writer.write_record([
                    "request".to_string(),
                    name.clone(),
                    summary.count.to_string(),
                    summary.failed.to_string(),
                    format!("{:.4}", summary.fail_rate),
                    format!("{:.2}", summary.latency.mean),
                    format!("{:.2}", summary.latency.percentiles.p50),
                    format!("{:.2}", summary.latency.percentiles.p95),
                    format!("{:.2}", summary.latency.max),
                ])?;
            }
            writer.flush()?;
        }
    }

    info!("Exported report to {}", path.display());
    Ok(())
}
