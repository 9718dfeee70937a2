//! Rate-limited HTTP client; the only place the crawler touches the network.
//!
//! Requests are spaced by a fixed delay measured from the end of one request
//! to the start of the next. Transient failures (timeouts, connection errors,
//! 5xx) are retried with linear backoff; 4xx responses fail immediately.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use queryharvest_shared::{HarvestError, PipelineConfig, Result};

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

/// Fixed-interval throttle. Uses Tokio's clock so tests can pause time.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last_finished: Option<Instant>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_finished: None,
        }
    }

    /// Sleep until `delay` has passed since the previous request finished.
    pub async fn wait(&self) {
        if let Some(last) = self.last_finished {
            let ready = last + self.delay;
            if ready > Instant::now() {
                tokio::time::sleep_until(ready).await;
            }
        }
    }

    /// Record that a request just finished.
    pub fn finished(&mut self) {
        self.last_finished = Some(Instant::now());
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Bounded retry with incremental backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Why a single attempt failed.
struct AttemptFailure {
    message: String,
    status: Option<u16>,
    transient: bool,
}

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/// Throttled, retrying HTTP client. Owned by the pipeline driver and lent
/// mutably to the lister and extractor.
pub struct HttpClient {
    client: Client,
    throttle: Throttle,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Build a client from the run configuration.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                HarvestError::config(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            throttle: Throttle::new(config.request_delay),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                backoff_step: config.retry_backoff,
            },
        })
    }

    /// Fetch `url` and return the response body as text.
    pub async fn fetch(&mut self, url: &Url) -> Result<String> {
        let mut attempt = 0;

        loop {
            self.throttle.wait().await;
            let outcome = self.attempt(url).await;
            self.throttle.finished();

            match outcome {
                Ok(body) => return Ok(body),
                Err(failure) if failure.transient && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        %url,
                        attempt,
                        error = %failure.message,
                        backoff_ms = backoff.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(failure) => {
                    return Err(HarvestError::network(
                        url.as_str(),
                        failure.message,
                        failure.status,
                    ));
                }
            }
        }
    }

    /// Run a single outbound call made outside this client (query execution)
    /// under the same spacing as [`fetch`](Self::fetch). The call is awaited
    /// once; it is never retried.
    pub async fn throttled<F: Future>(&mut self, call: F) -> F::Output {
        self.throttle.wait().await;
        let output = call.await;
        self.throttle.finished();
        output
    }

    /// Fetch `url` and decode the body as JSON.
    pub async fn fetch_json(&mut self, url: &Url) -> Result<serde_json::Value> {
        let body = self.fetch(url).await?;
        serde_json::from_str(&body)
            .map_err(|e| HarvestError::Serialization(format!("{url}: invalid JSON: {e}")))
    }

    async fn attempt(&self, url: &Url) -> std::result::Result<String, AttemptFailure> {
        debug!(%url, "GET");

        let response = self
            .client
            .get(url.as_str())
            .header(ACCEPT, "application/json, text/html;q=0.9, */*;q=0.8")
            .send()
            .await
            .map_err(|e| AttemptFailure {
                message: e.to_string(),
                status: None,
                transient: !e.is_builder() && !e.is_redirect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure {
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
                status: Some(status.as_u16()),
                transient: status.is_server_error(),
            });
        }

        response.text().await.map_err(|e| AttemptFailure {
            message: format!("body read failed: {e}"),
            status: Some(status.as_u16()),
            transient: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(delay: Duration) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.request_delay = delay;
        config.retry_backoff = Duration::from_millis(1);
        config.max_retries = 3;
        config
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{p}", server.uri())).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_spaces_consecutive_requests() {
        let mut throttle = Throttle::new(Duration::from_secs(2));
        let start = Instant::now();
        let mut starts = Vec::new();

        for _ in 0..3 {
            throttle.wait().await;
            starts.push(Instant::now());
            throttle.finished();
        }

        // First request is not delayed.
        assert_eq!(starts[0], start);
        assert!(starts[1] - starts[0] >= Duration::from_secs(2));
        assert!(starts[2] - starts[0] >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_measures_from_end_of_previous_request() {
        let mut throttle = Throttle::new(Duration::from_secs(1));
        throttle.finished();

        // A slow "request" that already used up the delay.
        tokio::time::advance(Duration::from_secs(3)).await;
        let before = Instant::now();
        throttle.wait().await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_calls_are_spaced_from_their_end() {
        let delay = Duration::from_secs(1);
        let mut client = HttpClient::new(&test_config(delay)).unwrap();

        let first_start = client.throttled(async { Instant::now() }).await;
        let slow_end = client
            .throttled(async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Instant::now()
            })
            .await;
        let third_start = client.throttled(async { Instant::now() }).await;

        assert!(slow_end - first_start >= delay + Duration::from_millis(500));
        assert!(third_start - slow_end >= delay);
    }

    #[test]
    fn backoff_is_incremental() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_step: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn three_fetches_respect_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(3)
            .mount(&server)
            .await;

        let delay = Duration::from_millis(100);
        let mut client = HttpClient::new(&test_config(delay)).unwrap();
        let target = url(&server, "/page");

        let start = std::time::Instant::now();
        for _ in 0..3 {
            assert_eq!(client.fetch(&target).await.unwrap(), "ok");
        }
        assert!(start.elapsed() >= delay * 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = HttpClient::new(&test_config(Duration::ZERO)).unwrap();
        let err = client.fetch(&url(&server, "/missing")).await.unwrap_err();

        match err {
            HarvestError::Network { status, url, .. } => {
                assert_eq!(status, Some(404));
                assert!(url.ends_with("/missing"));
            }
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_exhaust_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let mut client = HttpClient::new(&test_config(Duration::ZERO)).unwrap();
        let err = client.fetch(&url(&server, "/flaky")).await.unwrap_err();
        assert!(matches!(err, HarvestError::Network { status: Some(503), .. }));
    }

    #[tokio::test]
    async fn transient_failure_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recovering"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/recovering"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = HttpClient::new(&test_config(Duration::ZERO)).unwrap();
        let json = client.fetch_json(&url(&server, "/recovering")).await.unwrap();
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn connection_failure_surfaces_network_error() {
        // Reserve a free port, then release it so connections are refused.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let target = Url::parse(&format!("http://127.0.0.1:{port}/gone")).unwrap();

        let mut config = test_config(Duration::ZERO);
        config.max_retries = 1;
        let mut client = HttpClient::new(&config).unwrap();
        let err = client.fetch(&target).await.unwrap_err();
        assert!(matches!(err, HarvestError::Network { status: None, .. }));
    }
}
