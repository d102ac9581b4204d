//! Load-test workloads
//!
//! ## Workloads
//!
//! - `login`: one POST to the login endpoint, checking status, `code` and
//!   `message`
//! - `notifications`: login, then two authenticated GETs with bounded retry

mod login;
mod notifications;
mod retry;

pub use login::LoginProbe;
pub use notifications::NotificationFlow;

use crate::http::{Headers, HttpError};
use crate::metrics::Recorder;

/// How one iteration of a workload ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Every step ran (checks may still have failed)
    Completed,
    /// Login failed; the remaining steps were skipped
    LoginFailed,
}

/// A workload the scenario executor can run
pub enum Workload {
    Login(LoginProbe),
    Notifications(NotificationFlow),
}

impl Workload {
    pub fn name(&self) -> &'static str {
        match self {
            Workload::Login(_) => "login",
            Workload::Notifications(_) => "notifications",
        }
    }

    /// Run one iteration for the 1-based virtual user `vu`
    pub async fn run_iteration(&self, vu: u32, recorder: &Recorder) -> IterationOutcome {
        match self {
            Workload::Login(probe) => probe.run(recorder).await,
            Workload::Notifications(flow) => flow.run(vu, recorder).await,
        }
    }
}

/// First 12 characters of a token followed by `...`
pub fn token_preview(token: &str) -> String {
    let preview: String = token.chars().take(12).collect();
    format!("{preview}...")
}

/// Render headers for logs with the bearer token shortened
pub(crate) fn mask_headers(headers: &Headers) -> String {
    let masked: Headers = headers
        .iter()
        .map(|(k, v)| {
            let value = if k.eq_ignore_ascii_case("authorization") {
                match v.strip_prefix("Bearer ") {
                    Some(token) => format!("Bearer {}", token_preview(token)),
                    None => "***".to_string(),
                }
            } else {
                v.clone()
            };
            (k.clone(), value)
        })
        .collect();
    serde_json::to_string_pretty(&masked).unwrap_or_default()
}

/// Short description of why a request produced no response
pub(crate) fn no_response_reason(error: &anyhow::Error) -> String {
    match error.downcast_ref::<HttpError>() {
        Some(e) => e.to_string(),
        None => format!("{error:#}"),
    }
}
