//! Configuration module
//!
//! Handles loading and managing configuration. Precedence, lowest first:
//! built-in defaults, config file, environment, command-line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{find_config, load_config, CONFIG_LOCATIONS};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http::Headers;
use crate::metrics::ThresholdSet;
use crate::models::ScenarioOptions;

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Config file format version
    pub version: String,

    /// Base URL of the API under test
    pub base_url: Option<String>,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Skip TLS certificate verification
    pub insecure: bool,

    pub endpoints: Endpoints,

    pub login: LoginConfig,

    pub notifications: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            base_url: None,
            timeout_secs: 60,
            insecure: false,
            endpoints: Endpoints::default(),
            login: LoginConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if file::is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if file::is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("base_url must start with http:// or https://, got '{url}'");
            }
        }

        for scenario in [&self.login.scenario, &self.notifications.scenario] {
            if scenario.vus == 0 || scenario.iterations == 0 {
                anyhow::bail!(
                    "Scenario '{}' needs at least one VU and one iteration",
                    scenario.name
                );
            }
        }

        ThresholdSet::from_map(&self.notifications.thresholds)
            .context("Invalid notification thresholds")?;
        ThresholdSet::from_map(&self.login.thresholds).context("Invalid login thresholds")?;

        Ok(())
    }

    /// Override values set in the environment
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(url) = &env.base_url {
            self.base_url = Some(url.clone());
        }
        if let Some(timeout) = env.timeout {
            self.timeout_secs = timeout;
        }
        if let Some(insecure) = env.insecure {
            self.insecure = insecure;
        }
        if let Some(users_file) = &env.users_file {
            self.notifications.users_file = PathBuf::from(users_file);
        }
    }

    /// Base URL or an error naming where to set it
    pub fn require_base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Base URL is not set (use --base-url, BASE_URL or base_url in the config file)"))
    }

    /// Example configuration written by `config init`
    pub fn example() -> Self {
        Self {
            base_url: Some("https://api.example.com".to_string()),
            ..Self::default()
        }
    }
}

/// API paths, relative to the base URL
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub login: String,
    pub total_type: String,
    pub all_sent: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/api/auth/login".to_string(),
            total_type: "/api/notification/get-total-type-auth".to_string(),
            all_sent: "/api/notification/get-all-sent-auth".to_string(),
        }
    }
}

fn json_headers(extra: &[(&str, &str)]) -> Headers {
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Accept".to_string(), "application/json".to_string());
    for (key, value) in extra {
        headers.insert(key.to_string(), value.to_string());
    }
    headers
}

/// Login check settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub headers: Headers,

    /// Expected `code` field of a successful login
    pub success_code: i64,

    /// Expected `message` field of a successful login
    pub success_message: String,

    pub scenario: ScenarioOptions,

    pub thresholds: BTreeMap<String, Vec<String>>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            headers: json_headers(&[("X-Client-Language", "vi"), ("X-Client-Request", "HERO")]),
            success_code: 200,
            success_message: "Đăng nhập thành công".to_string(),
            scenario: ScenarioOptions::login_check(),
            thresholds: BTreeMap::new(),
        }
    }
}

/// Notification flow settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub headers: Headers,

    /// JSON array of `{username, password}` records
    pub users_file: PathBuf,

    /// Extra GET attempts after the first
    pub retries: u32,

    /// Fixed wait between GET attempts
    #[serde(with = "humantime_serde")]
    pub retry_wait: Duration,

    /// Wait after login before the authenticated calls
    #[serde(with = "humantime_serde")]
    pub token_settle: Duration,

    /// Wait at the end of each iteration
    #[serde(with = "humantime_serde")]
    pub iteration_pause: Duration,

    pub scenario: ScenarioOptions,

    pub thresholds: BTreeMap<String, Vec<String>>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        let thresholds = [
            ("http_req_failed{name:login}", "rate<0.1"),
            ("http_req_failed{name:total-type}", "rate<0.5"),
            ("http_req_failed{name:all-sent}", "rate<0.1"),
            ("http_req_duration", "p(95)<800"),
            ("checks", "rate>0.8"),
        ]
        .into_iter()
        .map(|(selector, expr)| (selector.to_string(), vec![expr.to_string()]))
        .collect();

        Self {
            headers: json_headers(&[("x-client-request", "hero"), ("x-client-language", "vi")]),
            users_file: PathBuf::from("users.json"),
            retries: 3,
            retry_wait: Duration::from_millis(500),
            token_settle: Duration::from_secs(1),
            iteration_pause: Duration::from_millis(300),
            scenario: ScenarioOptions::notification_flow(),
            thresholds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.endpoints.login, "/api/auth/login");
        assert_eq!(config.notifications.retries, 3);
        assert_eq!(config.notifications.retry_wait, Duration::from_millis(500));
        assert_eq!(config.notifications.thresholds.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_workload_headers_differ() {
        let config = AppConfig::default();
        assert_eq!(
            config.login.headers.get("X-Client-Request").map(String::as_str),
            Some("HERO")
        );
        assert_eq!(
            config
                .notifications
                .headers
                .get("x-client-request")
                .map(String::as_str),
            Some("hero")
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "base_url: http://localhost:8080\nnotifications:\n  retries: 1\n  retry_wait: 100ms\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.notifications.retries, 1);
        assert_eq!(config.notifications.retry_wait, Duration::from_millis(100));
        assert_eq!(config.notifications.token_settle, Duration::from_secs(1));
        assert_eq!(config.login.success_code, 200);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        for name in ["config.yaml", "config.json"] {
            let path = dir.path().join(name);
            AppConfig::example().save(&path).unwrap();
            let loaded = AppConfig::load(&path).unwrap();
            assert_eq!(loaded.base_url.as_deref(), Some("https://api.example.com"));
            assert_eq!(loaded.notifications.thresholds.len(), 5);
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.base_url = Some("ftp://x".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.notifications.scenario.vus = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config
            .notifications
            .thresholds
            .insert("checks".to_string(), vec!["rate>>0.8".to_string()]);
        assert!(config.validate().is_err());

        let config = AppConfig {
            version: "9.9".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_env() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            base_url: Some("http://staging.local".to_string()),
            timeout: Some(5),
            users_file: Some("/tmp/users.json".to_string()),
            ..Default::default()
        };

        config.apply_env(&env);
        assert_eq!(config.base_url.as_deref(), Some("http://staging.local"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(
            config.notifications.users_file,
            PathBuf::from("/tmp/users.json")
        );
        assert!(config.require_base_url().is_ok());
        assert!(AppConfig::default().require_base_url().is_err());
    }
}
