//! api-loadtest - HTTP load tests for a login and notification API
//!
//! Two workloads, each run by a per-VU-iterations executor with
//! k6-style checks and thresholds:
//!
//! - `login`: the admin account logs in and the response is checked for
//!   status, `code` and success message
//! - `notifications`: every virtual user logs in with its own credential,
//!   then fetches notification totals and sent notifications with retry
//!
//! ## Usage
//!
//! ```bash
//! # Admin login check
//! BASE_URL=https://api.example.com ADMIN_USERNAME=admin ADMIN_PASSWORD=secret \
//!     api-loadtest login
//!
//! # One virtual user per entry in users.json
//! api-loadtest notifications --users users.json --all-users --save
//!
//! # Stored runs
//! api-loadtest results --workload notifications
//! ```
//!
//! The process exits with 99 when a threshold is crossed and 1 on error.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod cli;
mod config;
mod executor;
mod http;
mod metrics;
mod models;
mod output;
mod probe;
mod results;
mod utils;

use cli::{
    Args, Command, ConfigAction, LoginArgs, NotificationArgs, ReportArgs, ResultsArgs,
    ScenarioArgs,
};
use config::{find_config, load_config, print_env_help, AppConfig, EnvConfig, CONFIG_LOCATIONS};
use executor::ScenarioRunner;
use http::HttpClient;
use metrics::ThresholdSet;
use models::{CredentialSet, RunReport, ScenarioOptions};
use output::{export_report, OutputFormat, ReportFormatter};
use probe::{LoginProbe, NotificationFlow, Workload};
use results::{ResultsStorage, StoredRun};
use utils::logger::{init_logger, LogLevel};

/// Exit status when at least one threshold fails
const THRESHOLD_EXIT: u8 = 99;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(log_level(&args, &env), !args.no_color);

    match run(args, env).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, env: EnvConfig) -> Result<ExitCode> {
    let no_color = args.no_color;
    let config_path = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));

    match args.command {
        Command::Login(login_args) => {
            let config = effective_config(config_path, &env)?;
            run_login(login_args, config, &env, no_color).await
        }
        Command::Notifications(notification_args) => {
            let config = effective_config(config_path, &env)?;
            run_notifications(notification_args, config, &env, no_color).await
        }
        Command::Results(results_args) => show_results(results_args, no_color),
        Command::Config(config_args) => {
            match config_args.action {
                ConfigAction::Show => {
                    if config_path.is_none() && find_config().is_none() {
                        println!(
                            "# No config file found (searched {}); showing defaults",
                            CONFIG_LOCATIONS.join(", ")
                        );
                    }
                    let config = effective_config(config_path, &env)?;
                    print!("{}", serde_yaml::to_string(&config)?);
                }
                ConfigAction::Init { path, force } => {
                    if path.exists() && !force {
                        bail!(
                            "{} already exists (use --force to overwrite)",
                            path.display()
                        );
                    }
                    AppConfig::example().save(&path)?;
                    println!("Wrote example configuration to {}", path.display());
                }
                ConfigAction::Env => {
                    print_env_help();
                    if env.has_any() {
                        println!();
                        env.print_summary();
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `--verbose` beats `--log-level`, which beats `LOADTEST_LOG_LEVEL`
fn log_level(args: &Args, env: &EnvConfig) -> LogLevel {
    if args.verbose {
        return LogLevel::Debug;
    }
    args.log_level
        .as_deref()
        .or(env.log_level.as_deref())
        .and_then(|level| match level.parse() {
            Ok(level) => Some(level),
            Err(e) => {
                eprintln!("{e}; using info");
                None
            }
        })
        .unwrap_or_default()
}

/// Config file (or defaults) with environment overrides applied
fn effective_config(path: Option<PathBuf>, env: &EnvConfig) -> Result<AppConfig> {
    let mut config = load_config(path.as_deref())?;
    config.apply_env(env);
    Ok(config)
}

/// Apply scenario flags and reject shapes that would run nothing
fn apply_scenario_args(
    mut scenario: ScenarioOptions,
    vus: Option<u32>,
    graceful_stop: Option<Duration>,
    args: &ScenarioArgs,
) -> Result<ScenarioOptions> {
    if let Some(vus) = vus {
        scenario = scenario.with_vus(vus);
    }
    if let Some(graceful_stop) = graceful_stop {
        scenario = scenario.with_graceful_stop(graceful_stop);
    }
    if let Some(iterations) = args.iterations {
        scenario = scenario.with_iterations(iterations);
    }
    if let Some(max_duration) = args.max_duration {
        scenario = scenario.with_max_duration(max_duration);
    }
    if scenario.vus == 0 || scenario.iterations == 0 {
        bail!("Scenario needs at least one VU and one iteration");
    }
    Ok(scenario)
}

async fn run_login(
    args: LoginArgs,
    mut config: AppConfig,
    env: &EnvConfig,
    no_color: bool,
) -> Result<ExitCode> {
    if let Some(url) = args.base_url {
        config.base_url = Some(url);
    }
    config.validate()?;
    let base_url = config.require_base_url()?.trim_end_matches('/').to_string();

    let mut credential = env.admin_credential();
    if let Some(username) = args.username {
        credential.username = username;
    }
    if let Some(password) = args.password {
        credential.password = password;
    }
    if credential.username.is_empty() {
        warn!("No admin username set (ADMIN_USERNAME or --username); logging in with an empty one");
    }

    let login = &config.login;
    let scenario = apply_scenario_args(login.scenario.clone(), args.vus, None, &args.scenario)?;
    let thresholds = ThresholdSet::from_map(&login.thresholds)?;

    let client = http_client(&config)?;
    let probe = LoginProbe::new(
        client,
        format!("{base_url}{}", config.endpoints.login),
        credential,
    )
    .with_headers(login.headers.clone())
    .expect_code(login.success_code)
    .expect_message(login.success_message.clone());

    let report = ScenarioRunner::new(scenario)
        .with_thresholds(thresholds)
        .run(Arc::new(Workload::Login(probe)))
        .await?;

    finish(report, &base_url, &args.report, env, no_color)
}

async fn run_notifications(
    args: NotificationArgs,
    mut config: AppConfig,
    env: &EnvConfig,
    no_color: bool,
) -> Result<ExitCode> {
    if let Some(url) = args.base_url {
        config.base_url = Some(url);
    }
    if let Some(users) = args.users {
        config.notifications.users_file = users;
    }
    if let Some(retries) = args.retries {
        config.notifications.retries = retries;
    }
    if let Some(retry_wait) = args.retry_wait {
        config.notifications.retry_wait = retry_wait;
    }
    config.validate()?;
    let base_url = config.require_base_url()?.trim_end_matches('/').to_string();

    let settings = &config.notifications;
    let users = CredentialSet::load_or_default(&settings.users_file, env.admin_credential());
    info!(
        "{} credential(s) available{}",
        users.len(),
        if users.is_fallback() { " (fallback)" } else { "" }
    );
    debug!(
        "Users: {}",
        users
            .iter()
            .map(|u| u.username.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let vus = if args.all_users {
        Some(users.len() as u32)
    } else {
        args.vus
    };
    let scenario = apply_scenario_args(
        settings.scenario.clone(),
        vus,
        args.graceful_stop,
        &args.scenario,
    )?;
    let thresholds = ThresholdSet::from_map(&settings.thresholds)?;

    let client = http_client(&config)?;
    let flow = NotificationFlow::new(client, &base_url, &config.endpoints, users)
        .configure(settings);

    let report = ScenarioRunner::new(scenario)
        .with_thresholds(thresholds)
        .run(Arc::new(Workload::Notifications(flow)))
        .await?;

    finish(report, &base_url, &args.report, env, no_color)
}

fn http_client(config: &AppConfig) -> Result<HttpClient> {
    HttpClient::build(config.timeout_secs, config.insecure)?.default_header(
        "User-Agent",
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
    )
}

fn formatter(format: OutputFormat, no_color: bool) -> ReportFormatter {
    let formatter = ReportFormatter::new(format);
    if no_color {
        formatter.no_color()
    } else {
        formatter
    }
}

/// Print, export and store the report, then map it to an exit status
fn finish(
    report: RunReport,
    base_url: &str,
    args: &ReportArgs,
    env: &EnvConfig,
    no_color: bool,
) -> Result<ExitCode> {
    let format: OutputFormat = args
        .format
        .as_deref()
        .or(env.format.as_deref())
        .unwrap_or("table")
        .parse()
        .map_err(anyhow::Error::msg)?;

    println!("{}", formatter(format, no_color).format_report(&report));

    if let Some(path) = &args.export {
        export_report(&report, path)?;
    }

    let passed = report.passed();
    if args.save {
        let path = ResultsStorage::default_dir().save(&StoredRun::new(base_url, report))?;
        println!("Results saved to {}", path.display());
    }

    if passed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(THRESHOLD_EXIT))
    }
}

fn show_results(args: ResultsArgs, no_color: bool) -> Result<ExitCode> {
    let storage = ResultsStorage::default_dir();
    let format: OutputFormat = args.format.parse().map_err(anyhow::Error::msg)?;
    let formatter = formatter(format, no_color);

    match &args.run {
        Some(run_id) => {
            let run = match &args.workload {
                Some(workload) => storage.load(workload, run_id)?,
                None => storage.find(run_id)?,
            };
            if matches!(format, OutputFormat::Table | OutputFormat::Summary) {
                println!(
                    "Target: {} | {} {} on {}",
                    run.base_url,
                    env!("CARGO_PKG_NAME"),
                    run.environment.tool_version,
                    run.environment.os
                );
            }
            println!("{}", formatter.format_report(&run.report));
        }
        None => {
            let runs = match &args.workload {
                Some(workload) => storage.list_runs(workload)?,
                None => storage.list_all()?,
            };
            println!("{}", formatter.format_runs(&runs));
            info!("Results directory: {}", storage.base_dir().display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
