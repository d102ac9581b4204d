//! Login check
//!
//! One POST to the login endpoint per iteration, no retry. The response is
//! checked for HTTP 200, the numeric success `code` and the success
//! `message`.

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use super::{no_response_reason, IterationOutcome};
use crate::http::{lookup_path, Headers, HttpClient};
use crate::metrics::{Recorder, RequestSample};
use crate::models::{CheckResult, Credential};

/// Request name used to tag login requests
pub const LOGIN_REQUEST: &str = "login";

/// JSON body of a login request
#[derive(Serialize)]
pub struct LoginPayload<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub remember: bool,
}

impl<'a> LoginPayload<'a> {
    pub fn new(credential: &'a Credential) -> Self {
        Self {
            username: &credential.username,
            password: &credential.password,
            remember: true,
        }
    }

    /// Payload as logged: password replaced
    pub fn redacted(&self) -> String {
        serde_json::json!({
            "username": self.username,
            "password": "***",
            "remember": self.remember,
        })
        .to_string()
    }
}

/// Login check against a fixed credential
#[derive(Clone)]
pub struct LoginProbe {
    client: HttpClient,
    url: String,
    headers: Headers,
    credential: Credential,
    success_code: i64,
    success_message: String,
}

impl LoginProbe {
    pub fn new(client: HttpClient, url: impl Into<String>, credential: Credential) -> Self {
        Self {
            client,
            url: url.into(),
            headers: Headers::new(),
            credential,
            success_code: 200,
            success_message: String::new(),
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn expect_code(mut self, code: i64) -> Self {
        self.success_code = code;
        self
    }

    pub fn expect_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }

    pub async fn run(&self, recorder: &Recorder) -> IterationOutcome {
        let username = &self.credential.username;
        let payload = LoginPayload::new(&self.credential);

        let result = self
            .client
            .post_json(&self.url, &self.headers, &payload)
            .await;
        recorder
            .request(RequestSample::from_result(LOGIN_REQUEST, &result))
            .await;

        let (status, body) = match &result {
            Ok(resp) => {
                let body = resp.json().unwrap_or(Value::Null);
                let rendered = match &body {
                    Value::Null => resp.body.clone(),
                    json => serde_json::to_string_pretty(json).unwrap_or_default(),
                };
                info!("Response from {username}: {rendered}");
                (Some(resp.status_code), body)
            }
            Err(e) => {
                error!(
                    "Login request for {username} got no response: {}",
                    no_response_reason(e)
                );
                (None, Value::Null)
            }
        };

        let code = lookup_path(&body, "code").and_then(Value::as_i64);
        let message = lookup_path(&body, "message").and_then(Value::as_str);

        let checks = [
            CheckResult::new("status is 200", status == Some(200)),
            CheckResult::new("code == 200", code == Some(self.success_code)),
            CheckResult::new("message", message == Some(self.success_message.as_str())),
        ];
        for check in checks {
            recorder.check(check).await;
        }

        IterationOutcome::Completed
    }
}
