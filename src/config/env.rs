//! Environment variable configuration
//!
//! The target and the default admin credentials come from unprefixed
//! variables (`BASE_URL`, `ADMIN_USERNAME`, `ADMIN_PASSWORD`); harness
//! settings use the `LOADTEST_` prefix.

use std::env;

use crate::models::Credential;

/// Environment variable prefix
const ENV_PREFIX: &str = "LOADTEST";

const BASE_URL: &str = "BASE_URL";
const ADMIN_USERNAME: &str = "ADMIN_USERNAME";
const ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// BASE_URL
    pub base_url: Option<String>,
    /// ADMIN_USERNAME
    pub admin_username: Option<String>,
    /// ADMIN_PASSWORD
    pub admin_password: Option<String>,
    /// LOADTEST_CONFIG
    pub config_file: Option<String>,
    /// LOADTEST_USERS_FILE
    pub users_file: Option<String>,
    /// LOADTEST_LOG_LEVEL
    pub log_level: Option<String>,
    /// LOADTEST_FORMAT
    pub format: Option<String>,
    /// LOADTEST_TIMEOUT
    pub timeout: Option<u64>,
    /// LOADTEST_INSECURE
    pub insecure: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            base_url: non_empty(BASE_URL),
            admin_username: non_empty(ADMIN_USERNAME),
            admin_password: non_empty(ADMIN_PASSWORD),
            config_file: get_env("CONFIG"),
            users_file: get_env("USERS_FILE"),
            log_level: get_env("LOG_LEVEL"),
            format: get_env("FORMAT"),
            timeout: get_env_parse("TIMEOUT"),
            insecure: get_env_bool("INSECURE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.base_url.is_some()
            || self.admin_username.is_some()
            || self.admin_password.is_some()
            || self.config_file.is_some()
            || self.users_file.is_some()
            || self.log_level.is_some()
            || self.format.is_some()
            || self.timeout.is_some()
            || self.insecure.is_some()
    }

    /// Default admin credential; missing values become empty strings
    pub fn admin_credential(&self) -> Credential {
        Credential::new(
            self.admin_username.clone().unwrap_or_default(),
            self.admin_password.clone().unwrap_or_default(),
        )
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        let masked = self.admin_password.as_ref().map(|_| "***");
        println!("Environment Configuration:");
        println!("  {BASE_URL}:              {:?}", self.base_url);
        println!("  {ADMIN_USERNAME}:        {:?}", self.admin_username);
        println!("  {ADMIN_PASSWORD}:        {masked:?}");
        println!("  {ENV_PREFIX}_CONFIG:       {:?}", self.config_file);
        println!("  {ENV_PREFIX}_USERS_FILE:   {:?}", self.users_file);
        println!("  {ENV_PREFIX}_LOG_LEVEL:    {:?}", self.log_level);
        println!("  {ENV_PREFIX}_FORMAT:       {:?}", self.format);
        println!("  {ENV_PREFIX}_TIMEOUT:      {:?}", self.timeout);
        println!("  {ENV_PREFIX}_INSECURE:     {:?}", self.insecure);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Unprefixed variable, treating an empty value as unset
fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Print all supported environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {BASE_URL}               Base URL of the API under test");
    println!("  {ADMIN_USERNAME}         Default username (login check, fallback user)");
    println!("  {ADMIN_PASSWORD}         Default password");
    println!("  {ENV_PREFIX}_CONFIG        Path to configuration file");
    println!("  {ENV_PREFIX}_USERS_FILE    Users file for the notification flow");
    println!("  {ENV_PREFIX}_LOG_LEVEL     Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_FORMAT        Report format (table, summary, json, json-pretty)");
    println!("  {ENV_PREFIX}_TIMEOUT       Request timeout in seconds");
    println!("  {ENV_PREFIX}_INSECURE      Skip TLS verification (true/false)");
    println!();
    println!("Example:");
    println!("  export {BASE_URL}=https://api.example.com");
    println!("  export {ADMIN_USERNAME}=admin {ADMIN_PASSWORD}=secret");
    println!("  api-loadtest notifications --users users.json --all-users");
}


#[cfg(test)]
mod tests {
    use super::testing::{EnvBuilder, ENV_LOCK};
    use super::*;

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.base_url.is_none());
        assert!(!config.has_any());
        assert_eq!(config.admin_credential(), Credential::new("", ""));
    }

    #[test]
    fn test_env_load() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvBuilder::new()
            .var("BASE_URL", "http://10.0.0.1:8080")
            .var("ADMIN_USERNAME", "admin")
            .var("ADMIN_PASSWORD", "s3cret")
            .var("LOADTEST_TIMEOUT", "15")
            .var("LOADTEST_INSECURE", "yes")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.base_url.as_deref(), Some("http://10.0.0.1:8080"));
        assert_eq!(config.timeout, Some(15));
        assert_eq!(config.insecure, Some(true));
        assert_eq!(config.admin_credential(), Credential::new("admin", "s3cret"));
        assert!(config.has_any());
    }

    #[test]
    fn test_empty_value_is_unset() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvBuilder::new().var("BASE_URL", "").apply_scoped();

        assert!(EnvConfig::load().base_url.is_none());
    }
}
