//! Scenario execution
//!
//! Implements the `per-vu-iterations` executor: every virtual user runs a
//! fixed number of iterations, one after another, on its own task.

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::metrics::{MetricsCollector, Recorder, ThresholdSet};
use crate::models::{RunReport, ScenarioOptions};
use crate::probe::{IterationOutcome, Workload};
use crate::results::generate_run_id;
use crate::utils::timer::Timer;

/// Iteration counters shared by all VU tasks
#[derive(Default)]
struct IterationCounters {
    completed: AtomicU64,
    interrupted: AtomicU64,
    aborted: AtomicU64,
}

/// Runs one workload under a scenario and evaluates its thresholds
pub struct ScenarioRunner {
    options: ScenarioOptions,
    thresholds: ThresholdSet,
}

impl ScenarioRunner {
    pub fn new(options: ScenarioOptions) -> Self {
        Self {
            options,
            thresholds: ThresholdSet::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdSet) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Run the scenario to completion
    pub async fn run(&self, workload: Arc<Workload>) -> Result<RunReport> {
        info!(
            "Starting {} - {} ({} iteration(s) planned)",
            workload.name(),
            self.options,
            self.options.planned_iterations()
        );

        if self.thresholds.is_empty() {
            debug!("No thresholds declared for {}", workload.name());
        } else {
            debug!("{} threshold expression(s) declared", self.thresholds.len());
        }

        let recorder = Recorder::new();
        let counters = Arc::new(IterationCounters::default());
        let started_at = Utc::now();
        let timer = Timer::start(workload.name());

        let start = Instant::now();
        // No iteration starts after `stop_starting`; running ones are cut at `hard_stop`.
        let stop_starting = start + self.options.max_duration;
        let hard_stop = stop_starting + self.options.graceful_stop;

        let handles: Vec<_> = (1..=self.options.vus)
            .map(|vu| {
                let workload = workload.clone();
                let recorder = recorder.clone();
                let counters = counters.clone();
                let iterations = self.options.iterations;

                tokio::spawn(async move {
                    for iteration in 1..=iterations {
                        if Instant::now() >= stop_starting {
                            debug!("[VU {vu}] max duration reached before iteration {iteration}");
                            break;
                        }

                        match timeout_at(hard_stop, workload.run_iteration(vu, &recorder)).await {
                            Ok(outcome) => {
                                counters.completed.fetch_add(1, Ordering::SeqCst);
                                if outcome == IterationOutcome::LoginFailed {
                                    counters.aborted.fetch_add(1, Ordering::SeqCst);
                                }
                                debug!("[VU {vu}] iteration {iteration} finished: {outcome:?}");
                            }
                            Err(_) => {
                                counters.interrupted.fetch_add(1, Ordering::SeqCst);
                                warn!("[VU {vu}] iteration {iteration} interrupted at graceful stop");
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Virtual user task failed: {e}");
            }
        }

        let duration = timer.stop();
        let metrics = recorder.snapshot().await;
        let thresholds = recorder
            .with_collector(|collector: &MetricsCollector| self.thresholds.evaluate(collector))
            .await;

        let report = RunReport {
            id: generate_run_id(),
            workload: workload.name().to_string(),
            started_at,
            duration_ms: duration.as_millis() as u64,
            scenario: self.options.clone(),
            iterations_completed: counters.completed.load(Ordering::SeqCst),
            iterations_interrupted: counters.interrupted.load(Ordering::SeqCst),
            metrics,
            thresholds,
        };

        info!(
            "{} finished in {}ms - {} iteration(s), {} ended early at login, {} interrupted, checks {:.1}%",
            report.workload,
            report.duration_ms,
            report.iterations_completed,
            counters.aborted.load(Ordering::SeqCst),
            report.iterations_interrupted,
            report.check_pass_rate()
        );
        debug!("http_req_duration: {}", report.metrics.requests.latency.format_summary());
        for failed in report.failed_thresholds() {
            warn!("Threshold crossed: {failed}");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoints, NotificationConfig};
    use crate::http::HttpClient;
    use crate::models::{Credential, CredentialSet};
    use crate::probe::{LoginProbe, NotificationFlow};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn two_users() -> CredentialSet {
        CredentialSet::from_users(
            vec![Credential::new("u1", "p1"), Credential::new("u2", "p2")],
            Credential::new("admin", "admin"),
        )
    }

    fn notification_workload(server: &MockServer, users: CredentialSet) -> Arc<Workload> {
        let config = NotificationConfig {
            retry_wait: Duration::from_millis(1),
            token_settle: Duration::ZERO,
            iteration_pause: Duration::ZERO,
            ..NotificationConfig::default()
        };
        let flow = NotificationFlow::new(
            HttpClient::new().unwrap(),
            &server.uri(),
            &Endpoints::default(),
            users,
        )
        .configure(&config);
        Arc::new(Workload::Notifications(flow))
    }

    fn default_thresholds() -> ThresholdSet {
        ThresholdSet::from_map(&NotificationConfig::default().thresholds).unwrap()
    }

    #[tokio::test]
    async fn test_two_users_one_iteration_each() {
        let server = MockServer::start().await;
        for (user, token) in [("u1", "token-1"), ("u2", "token-2")] {
            Mock::given(method("POST"))
                .and(path("/api/auth/login"))
                .and(body_partial_json(json!({"username": user})))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"code": 200, "data": {"access_token": token}})),
                )
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(header("Authorization", format!("Bearer {token}").as_str()))
                .respond_with(ResponseTemplate::new(200))
                .expect(2)
                .mount(&server)
                .await;
        }

        let runner = ScenarioRunner::new(ScenarioOptions::notification_flow().with_vus(2))
            .with_thresholds(default_thresholds());
        let report = runner
            .run(notification_workload(&server, two_users()))
            .await
            .unwrap();

        assert_eq!(report.iterations_completed, 2);
        assert_eq!(report.iterations_interrupted, 0);
        assert_eq!(report.metrics.by_name["login"].count, 2);
        assert_eq!(report.metrics.by_name["total-type"].count, 2);
        assert_eq!(report.metrics.by_name["all-sent"].count, 2);
        assert_eq!(report.metrics.requests.count, 6);
        assert_eq!(report.metrics.checks_passed(), 6);
        assert!(report.passed());
    }

    #[tokio::test]
    async fn test_runs_vus_times_iterations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 200, "message": "ok"})),
            )
            .expect(6)
            .mount(&server)
            .await;

        let probe = LoginProbe::new(
            HttpClient::new().unwrap(),
            format!("{}/api/auth/login", server.uri()),
            Credential::new("admin", "pw"),
        )
        .expect_message("ok");

        let options = ScenarioOptions::new("smoke")
            .with_vus(3)
            .with_iterations(2)
            .with_max_duration(Duration::from_secs(30));
        let report = ScenarioRunner::new(options)
            .run(Arc::new(Workload::Login(probe)))
            .await
            .unwrap();

        assert_eq!(report.iterations_completed, 6);
        assert_eq!(report.metrics.checks_total(), 18);
        assert!((report.metrics.check_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_login_failure_crosses_thresholds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let report = ScenarioRunner::new(ScenarioOptions::notification_flow())
            .with_thresholds(default_thresholds())
            .run(notification_workload(&server, two_users()))
            .await
            .unwrap();

        assert_eq!(report.iterations_completed, 1);
        assert!(!report.passed());
        let failed: Vec<_> = report.failed_thresholds().map(|t| t.selector.clone()).collect();
        assert!(failed.contains(&"http_req_failed{name:login}".to_string()));
        assert!(failed.contains(&"checks".to_string()));
    }

    #[tokio::test]
    async fn test_slow_iteration_interrupted_at_graceful_stop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let probe = LoginProbe::new(
            HttpClient::new().unwrap(),
            format!("{}/api/auth/login", server.uri()),
            Credential::new("admin", "pw"),
        );
        let options = ScenarioOptions::new("slow")
            .with_iterations(3)
            .with_max_duration(Duration::from_millis(100))
            .with_graceful_stop(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let report = ScenarioRunner::new(options)
            .run(Arc::new(Workload::Login(probe)))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(report.iterations_completed, 0);
        assert_eq!(report.iterations_interrupted, 1);
    }

    #[tokio::test]
    async fn test_no_iteration_starts_after_max_duration() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(150))
                    .set_body_json(json!({"code": 200})),
            )
            .mount(&server)
            .await;

        let probe = LoginProbe::new(
            HttpClient::new().unwrap(),
            format!("{}/api/auth/login", server.uri()),
            Credential::new("admin", "pw"),
        );
        let options = ScenarioOptions::new("bounded")
            .with_iterations(100)
            .with_max_duration(Duration::from_millis(200))
            .with_graceful_stop(Duration::from_secs(5));

        let report = ScenarioRunner::new(options)
            .run(Arc::new(Workload::Login(probe)))
            .await
            .unwrap();

        assert_eq!(report.iterations_interrupted, 0);
        assert!(report.iterations_completed >= 1);
        assert!(report.iterations_completed <= 3);
    }
}
