//! Results storage and retrieval

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::RunReport;

/// Stored run: the report plus where it was produced
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    /// Base URL the run targeted
    pub base_url: String,

    pub environment: EnvironmentInfo,

    pub report: RunReport,
}

/// Environment information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Operating system
    pub os: String,

    /// Architecture
    pub arch: String,

    /// Tool version
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredRun {
    pub fn new(base_url: impl Into<String>, report: RunReport) -> Self {
        Self {
            base_url: base_url.into(),
            environment: EnvironmentInfo::default(),
            report,
        }
    }
}

/// Brief run information
#[derive(Clone, Debug, Serialize)]
pub struct RunInfo {
    pub id: String,
    pub workload: String,
    pub started_at: DateTime<Utc>,
    pub iterations: u64,
    /// Check pass rate (0.0 - 1.0)
    pub check_rate: f64,
    pub passed: bool,
}

impl From<&StoredRun> for RunInfo {
    fn from(run: &StoredRun) -> Self {
        Self {
            id: run.report.id.clone(),
            workload: run.report.workload.clone(),
            started_at: run.report.started_at,
            iterations: run.report.iterations_completed,
            check_rate: run.report.metrics.check_rate,
            passed: run.report.passed(),
        }
    }
}

/// Generate a unique run id: `YYYYmmdd_HHMMSS_NNNN`
pub fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Results storage manager
pub struct ResultsStorage {
    /// Base directory for results
    base_dir: PathBuf,
}

impl ResultsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Storage under the platform data directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("api-loadtest")
            .join("results");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn workload_dir(&self, workload: &str) -> PathBuf {
        self.base_dir.join(workload.to_lowercase())
    }

    fn run_path(&self, workload: &str, run_id: &str) -> PathBuf {
        self.workload_dir(workload).join(format!("{run_id}.json"))
    }

    /// Save a run
    pub fn save(&self, run: &StoredRun) -> Result<PathBuf> {
        let workload_dir = self.workload_dir(&run.report.workload);
        fs::create_dir_all(&workload_dir).with_context(|| {
            format!("Failed to create results directory {}", workload_dir.display())
        })?;

        let path = self.run_path(&run.report.workload, &run.report.id);
        let file = File::create(&path).context("Failed to create results file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), run)
            .context("Failed to write results")?;

        info!("Saved run results to {}", path.display());
        Ok(path)
    }

    /// Load one run
    pub fn load(&self, workload: &str, run_id: &str) -> Result<StoredRun> {
        let path = self.run_path(workload, run_id);
        let run = self
            .load_from_path(&path)
            .with_context(|| format!("Run {run_id} not found for workload {workload}"))?;
        debug!("Loaded run results from {}", path.display());
        Ok(run)
    }

    /// Find a run by id in any workload
    pub fn find(&self, run_id: &str) -> Result<StoredRun> {
        for workload in self.list_workloads()? {
            let path = self.run_path(&workload, run_id);
            if path.exists() {
                return self.load_from_path(&path);
            }
        }
        anyhow::bail!("Run {run_id} not found in {}", self.base_dir.display())
    }

    pub fn load_from_path(&self, path: &Path) -> Result<StoredRun> {
        let file = File::open(path).context("Failed to open results file")?;
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse results")
    }

    /// Workloads with at least one stored run directory
    pub fn list_workloads(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut workloads = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    workloads.push(name.to_string());
                }
            }
        }

        workloads.sort();
        Ok(workloads)
    }

    /// Runs for one workload, newest first. Unreadable files are skipped.
    pub fn list_runs(&self, workload: &str) -> Result<Vec<RunInfo>> {
        let workload_dir = self.workload_dir(workload);
        if !workload_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&workload_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match self.load_from_path(&path) {
                    Ok(run) => runs.push(RunInfo::from(&run)),
                    Err(e) => debug!("Failed to load {}: {e:#}", path.display()),
                }
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    /// Runs across every workload, newest first
    pub fn list_all(&self) -> Result<Vec<RunInfo>> {
        let mut runs = Vec::new();
        for workload in self.list_workloads()? {
            runs.extend(self.list_runs(&workload)?);
        }
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSnapshot;
    use crate::models::ScenarioOptions;
    use chrono::Duration;
    use tempfile::TempDir;

    fn run(id: &str, workload: &str, started_at: DateTime<Utc>) -> StoredRun {
        StoredRun::new(
            "https://api.example.com",
            RunReport {
                id: id.to_string(),
                workload: workload.to_string(),
                started_at,
                duration_ms: 1000,
                scenario: ScenarioOptions::login_check(),
                iterations_completed: 1,
                iterations_interrupted: 0,
                metrics: MetricsSnapshot::default(),
                thresholds: Vec::new(),
            },
        )
    }

    #[test]
    fn test_generate_run_id_format() {
        let id = generate_run_id();
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 4);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let storage = ResultsStorage::new(dir.path());

        let path = storage
            .save(&run("20261019_120000_0001", "login", Utc::now()))
            .unwrap();
        assert!(path.ends_with("login/20261019_120000_0001.json"));

        let loaded = storage.load("login", "20261019_120000_0001").unwrap();
        assert_eq!(loaded.base_url, "https://api.example.com");
        assert_eq!(loaded.environment.tool_version, env!("CARGO_PKG_VERSION"));

        let found = storage.find("20261019_120000_0001").unwrap();
        assert_eq!(found.report.workload, "login");
        assert!(storage.find("missing").is_err());
    }

    #[test]
    fn test_list_runs_newest_first() {
        let dir = TempDir::new().unwrap();
        let storage = ResultsStorage::new(dir.path());
        let now = Utc::now();

        storage.save(&run("old", "notifications", now - Duration::hours(1))).unwrap();
        storage.save(&run("new", "notifications", now)).unwrap();
        storage.save(&run("other", "login", now)).unwrap();
        fs::write(dir.path().join("notifications/broken.json"), "{").unwrap();

        let runs = storage.list_runs("notifications").unwrap();
        let ids: Vec<_> = runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["new", "old"]);
        assert!(runs[0].passed);

        assert_eq!(storage.list_workloads().unwrap(), ["login", "notifications"]);
        assert_eq!(storage.list_all().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_dir_lists_nothing() {
        let storage = ResultsStorage::new("/nonexistent/api-loadtest");
        assert!(storage.list_runs("login").unwrap().is_empty());
        assert!(storage.list_workloads().unwrap().is_empty());
    }
}
