//! Authenticated notification flow
//!
//! Per iteration: pick the VU's credential, log in, wait for the token to
//! settle, fetch notification-type totals and sent notifications (each with
//! bounded retry), then pause.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use super::login::{LoginPayload, LOGIN_REQUEST};
use super::retry::{get_with_retry, RetryPolicy};
use super::{no_response_reason, token_preview, IterationOutcome};
use crate::config::{Endpoints, NotificationConfig};
use crate::http::{Headers, HttpClient};
use crate::metrics::{Recorder, RequestSample};
use crate::models::{CheckResult, Credential, CredentialSet};

/// One authenticated GET in the flow
struct AuthenticatedCall {
    url: String,
    /// `name` tag for request metrics
    request: &'static str,
    /// Check recorded for the call
    check: &'static str,
}

/// Login-then-fetch-notifications flow
pub struct NotificationFlow {
    client: HttpClient,
    users: CredentialSet,
    headers: Headers,
    login_url: String,
    calls: [AuthenticatedCall; 2],
    retry: RetryPolicy,
    token_settle: Duration,
    iteration_pause: Duration,
}

impl NotificationFlow {
    pub fn new(
        client: HttpClient,
        base_url: &str,
        endpoints: &Endpoints,
        users: CredentialSet,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        let defaults = NotificationConfig::default();

        Self {
            client,
            users,
            headers: defaults.headers,
            login_url: format!("{base}{}", endpoints.login),
            calls: [
                AuthenticatedCall {
                    url: format!("{base}{}", endpoints.total_type),
                    request: "total-type",
                    check: "get-total-type-auth is 200",
                },
                AuthenticatedCall {
                    url: format!("{base}{}", endpoints.all_sent),
                    request: "all-sent",
                    check: "get-all-sent-auth is 200",
                },
            ],
            retry: RetryPolicy::new(defaults.retries, defaults.retry_wait),
            token_settle: defaults.token_settle,
            iteration_pause: defaults.iteration_pause,
        }
    }

    /// Apply headers, retry policy and waits from the configuration
    pub fn configure(mut self, config: &NotificationConfig) -> Self {
        self.headers = config.headers.clone();
        self.with_retry(RetryPolicy::new(config.retries, config.retry_wait))
            .with_waits(config.token_settle, config.iteration_pause)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_waits(mut self, token_settle: Duration, iteration_pause: Duration) -> Self {
        self.token_settle = token_settle;
        self.iteration_pause = iteration_pause;
        self
    }

    pub async fn run(&self, vu: u32, recorder: &Recorder) -> IterationOutcome {
        let user = self.users.for_vu(vu);
        info!("[VU {vu}] Testing with user: {}", user.username);

        let token = match self.login(user, recorder).await {
            Some(token) => token,
            None => return IterationOutcome::LoginFailed,
        };

        let mut auth_headers = self.headers.clone();
        auth_headers.insert("Authorization".to_string(), format!("Bearer {token}"));

        sleep(self.token_settle).await;

        for call in &self.calls {
            let response = get_with_retry(
                &self.client,
                recorder,
                &call.url,
                &auth_headers,
                call.request,
                &user.username,
                self.retry,
            )
            .await;

            let check = match response {
                Some(resp) => CheckResult::new(call.check, resp.status_code == 200),
                None => CheckResult::fail(
                    call.check,
                    format!("no 200 response after {} attempts", self.retry.max_attempts()),
                ),
            };
            recorder.check(check).await;
        }

        sleep(self.iteration_pause).await;
        IterationOutcome::Completed
    }

    /// Log in and return the access token, or `None` after logging why not
    async fn login(&self, user: &Credential, recorder: &Recorder) -> Option<String> {
        let payload = LoginPayload::new(user);
        let result = self
            .client
            .post_json(&self.login_url, &self.headers, &payload)
            .await;
        recorder
            .request(RequestSample::from_result(LOGIN_REQUEST, &result))
            .await;

        let token = match &result {
            Ok(resp) if resp.status_code == 200 => resp
                .json_path("data.access_token")
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|t| !t.is_empty()),
            _ => None,
        };

        recorder
            .check(CheckResult::new("login succeeded", token.is_some()))
            .await;

        match (&token, &result) {
            (Some(token), _) => {
                info!(
                    "[{}] Login OK - Token: {}",
                    user.username,
                    token_preview(token)
                );
            }
            (None, Ok(resp)) => {
                error!("Login failed for {}", user.username);
                error!("Status: {}", resp.status_code);
                error!("Duration: {:.2}ms", resp.duration_ms);
                error!("Request payload: {}", payload.redacted());
                error!("Response body: {}", resp.body);
            }
            (None, Err(e)) => {
                error!("Login failed for {}", user.username);
                error!("Status: No response ({})", no_response_reason(e));
                error!("Request payload: {}", payload.redacted());
            }
        }

        token
    }
}
