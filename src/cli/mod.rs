//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// HTTP load tests for the login and notification APIs
#[derive(Parser, Debug)]
#[command(name = "api-loadtest")]
#[command(version)]
#[command(about = "Load-test the login and notification endpoints of an API")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the admin account can log in
    Login(LoginArgs),

    /// Log in as each user and fetch notifications concurrently
    Notifications(NotificationArgs),

    /// View stored run results
    Results(ResultsArgs),

    /// Show or create configuration
    Config(ConfigArgs),
}

/// Scenario shape shared by the workload commands
#[derive(ClapArgs, Debug, Default)]
pub struct ScenarioArgs {
    /// Iterations per virtual user
    #[arg(short, long)]
    pub iterations: Option<u32>,

    /// No iteration starts after this long (e.g. 30s, 1m)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub max_duration: Option<Duration>,
}

/// Where the report goes
#[derive(ClapArgs, Debug, Default)]
pub struct ReportArgs {
    /// Output format (table, summary, json, json-pretty)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Export the report to a .json or .csv file
    #[arg(short, long)]
    pub export: Option<PathBuf>,

    /// Store the report with the other results
    #[arg(short, long)]
    pub save: bool,
}

/// Arguments for the login command
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// API base URL (overrides BASE_URL)
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Admin username (overrides ADMIN_USERNAME)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Admin password (overrides ADMIN_PASSWORD)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Number of virtual users
    #[arg(long)]
    pub vus: Option<u32>,

    #[command(flatten)]
    pub scenario: ScenarioArgs,

    #[command(flatten)]
    pub report: ReportArgs,
}

/// Arguments for the notifications command
#[derive(Parser, Debug)]
pub struct NotificationArgs {
    /// API base URL (overrides BASE_URL)
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Credential file: JSON array of {username, password}
    #[arg(short, long)]
    pub users: Option<PathBuf>,

    /// Number of virtual users
    #[arg(long, conflicts_with = "all_users")]
    pub vus: Option<u32>,

    /// One virtual user per loaded credential
    #[arg(short, long)]
    pub all_users: bool,

    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Time running iterations get to finish after max duration
    #[arg(long, value_parser = humantime::parse_duration)]
    pub graceful_stop: Option<Duration>,

    /// Retries per notification request after the first attempt
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Wait between attempts (e.g. 500ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub retry_wait: Option<Duration>,

    #[command(flatten)]
    pub report: ReportArgs,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Filter by workload (login, notifications)
    #[arg(short, long)]
    pub workload: Option<String>,

    /// Show a single run
    #[arg(short, long)]
    pub run: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write an example configuration file
    Init {
        /// Destination path
        #[arg(default_value = "loadtest.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List supported environment variables
    Env,
}
