//! Bounded-retry GET
//!
//! Fixed attempt count, fixed wait between attempts. Every attempt is
//! recorded as a request sample under the call's logical name.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::{mask_headers, no_response_reason};
use crate::http::{Headers, HttpClient, HttpResponse};
use crate::metrics::{Recorder, RequestSample};

/// Retry budget for authenticated GETs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Wait between attempts
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            wait: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, wait: Duration) -> Self {
        Self { retries, wait }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }
}

/// GET `url` until it answers 200 or the retry budget runs out.
///
/// Returns the first 200 response, or `None` when every attempt failed.
pub async fn get_with_retry(
    client: &HttpClient,
    recorder: &Recorder,
    url: &str,
    headers: &Headers,
    name: &str,
    username: &str,
    policy: RetryPolicy,
) -> Option<HttpResponse> {
    let attempts = policy.max_attempts();

    for attempt in 1..=attempts {
        let result = client.get_with_headers(url, headers).await;
        recorder
            .request(RequestSample::from_result(name, &result))
            .await;

        match result {
            Ok(resp) if resp.status_code == 200 => {
                info!(
                    "[{}] {} success: {} ({}) [{:.2}ms]",
                    username, name, url, resp.status_code, resp.duration_ms
                );
                return Some(resp);
            }
            Ok(resp) => {
                warn!("[{username}] Attempt {attempt}/{attempts} - {name} failed");
                warn!("URL: {url}");
                warn!("Status: {}", resp.status_code);
                warn!("Duration: {:.2}ms", resp.duration_ms);
                warn!("Request headers: {}", mask_headers(headers));
                warn!("Response body:\n{}", resp.body);
            }
            Err(e) => {
                warn!("[{username}] Attempt {attempt}/{attempts} - {name} failed");
                warn!("URL: {url}");
                warn!("Status: No response ({})", no_response_reason(&e));
                warn!("Duration: N/A");
                warn!("Request headers: {}", mask_headers(headers));
            }
        }

        if attempt < attempts {
            sleep(policy.wait).await;
        }
    }

    error!("[{username}] All retries failed for {name} - {url}");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PATH: &str = "/api/notification/get-total-type-auth";

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(1))
    }

    fn auth_headers() -> Headers {
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), "Bearer token-123".to_string());
        headers
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.wait, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PATH))
            .and(header("Authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let recorder = Recorder::new();
        let url = format!("{}{}", server.uri(), PATH);

        let resp = get_with_retry(
            &client,
            &recorder,
            &url,
            &auth_headers(),
            "total-type",
            "u1",
            fast_policy(3),
        )
        .await;

        assert_eq!(resp.map(|r| r.status_code), Some(200));
        assert_eq!(recorder.snapshot().await.by_name["total-type"].count, 1);
    }

    #[tokio::test]
    async fn test_returns_first_200_after_failures() {
        let server = MockServer::start().await;
        // Mocks are matched in mount order; the 503 stops matching after two hits.
        Mock::given(method("GET"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let recorder = Recorder::new();
        let url = format!("{}{}", server.uri(), PATH);

        let resp = get_with_retry(
            &client,
            &recorder,
            &url,
            &auth_headers(),
            "total-type",
            "u1",
            fast_policy(3),
        )
        .await
        .unwrap();

        assert_eq!(resp.body, "ok");
        let snapshot = recorder.snapshot().await;
        assert_eq!(snapshot.by_name["total-type"].count, 3);
        assert_eq!(snapshot.by_name["total-type"].failed, 2);
    }

    #[tokio::test]
    async fn test_exhausted_after_retries_plus_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(4)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let recorder = Recorder::new();
        let url = format!("{}{}", server.uri(), PATH);

        let resp = get_with_retry(
            &client,
            &recorder,
            &url,
            &auth_headers(),
            "total-type",
            "u1",
            fast_policy(3),
        )
        .await;

        assert!(resp.is_none());
        let snapshot = recorder.snapshot().await;
        assert_eq!(snapshot.by_name["total-type"].count, 4);
        assert_eq!(snapshot.errors.server_errors, 4);
    }

    #[tokio::test]
    async fn test_no_wait_after_last_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let recorder = Recorder::new();
        let url = format!("{}{}", server.uri(), PATH);
        let policy = RetryPolicy::new(1, Duration::from_millis(300));

        let start = Instant::now();
        let resp = get_with_retry(
            &client,
            &recorder,
            &url,
            &Headers::new(),
            "all-sent",
            "u1",
            policy,
        )
        .await;
        let elapsed = start.elapsed();

        assert!(resp.is_none());
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_no_response_counts_as_failed_attempt() {
        let client = HttpClient::with_timeout(2).unwrap();
        let recorder = Recorder::new();

        let resp = get_with_retry(
            &client,
            &recorder,
            "http://127.0.0.1:9/api/notification/get-all-sent-auth",
            &Headers::new(),
            "all-sent",
            "u1",
            fast_policy(2),
        )
        .await;

        assert!(resp.is_none());
        let snapshot = recorder.snapshot().await;
        assert_eq!(snapshot.by_name["all-sent"].count, 3);
        assert_eq!(snapshot.by_name["all-sent"].failed, 3);
    }
}
