//! Query execution against the configured endpoint.
//!
//! Execution never fails from the caller's point of view: transport errors,
//! timeouts and error statuses are all encoded in the returned
//! [`ExecutionResult`]. There is no retry; one failed attempt is final.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, REFERER};
use tracing::{debug, instrument, warn};
use url::Url;

use queryharvest_shared::{ExecutionResult, HarvestError, PipelineConfig, RequestFormat, Result};

use crate::results;

/// Result formats requested from the endpoint, tabular first.
const ACCEPT_RESULTS: &str = "application/sparql-results+json, text/turtle;q=0.9, */*;q=0.1";

/// Characters of an error response body kept in the failure message.
const ERROR_SAMPLE_LIMIT: usize = 500;

/// Anything that can run a query and report the outcome.
pub trait QueryExecutor {
    /// Run `sparql`; `query_id` identifies the catalog entry to the endpoint when supported.
    fn execute(
        &self,
        sparql: &str,
        query_id: Option<&str>,
    ) -> impl Future<Output = ExecutionResult> + Send;
}

/// Executes queries over HTTP against a single SPARQL endpoint.
pub struct SparqlExecutor {
    client: Client,
    endpoint: Url,
    enabled: bool,
    timeout: Duration,
    format: RequestFormat,
    referer: Option<String>,
    cookie: Option<String>,
}

impl SparqlExecutor {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.execution_timeout)
            .build()
            .map_err(|e| HarvestError::config(format!("failed to build SPARQL client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            enabled: config.execute,
            timeout: config.execution_timeout,
            format: config.request_format,
            referer: config.referer.clone(),
            cookie: config.cookie.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, sparql: &str, query_id: Option<&str>) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(self.endpoint.as_str())
            .header(ACCEPT, ACCEPT_RESULTS);

        request = match self.format {
            RequestFormat::Form => request.form(&[("query", sparql)]),
            RequestFormat::Json => {
                let request = request.json(&serde_json::json!({ "query": sparql }));
                match query_id {
                    Some(id) => request.header("x-t-queryid", id),
                    None => request,
                }
            }
        };

        if let Some(referer) = &self.referer {
            request = request.header(REFERER, referer.as_str());
        }
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie.as_str());
        }
        request
    }
}

impl QueryExecutor for SparqlExecutor {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, query_id = query_id.unwrap_or("-")))]
    async fn execute(&self, sparql: &str, query_id: Option<&str>) -> ExecutionResult {
        if !self.enabled {
            return ExecutionResult::skipped();
        }

        let start = Instant::now();
        let elapsed_ms = || start.elapsed().as_millis() as u64;

        let response = match self.request(sparql, query_id).send().await {
            Ok(response) => response,
            Err(e) => {
                let cause = if e.is_timeout() {
                    format!("timed out after {:.1}s", self.timeout.as_secs_f64())
                } else {
                    format!("request failed: {e}")
                };
                warn!(error = %cause, "execution failed");
                return ExecutionResult::failed(cause, None, elapsed_ms());
            }
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let cause = format!("failed to read response: {e}");
                warn!(error = %cause, "execution failed");
                return ExecutionResult::failed(cause, Some(status.as_u16()), elapsed_ms());
            }
        };

        if !status.is_success() {
            let cause = format!(
                "HTTP {}: {}",
                status.as_u16(),
                results::truncate(body.trim(), ERROR_SAMPLE_LIMIT)
            );
            warn!(status = status.as_u16(), "endpoint rejected query");
            return ExecutionResult::failed(cause, Some(status.as_u16()), elapsed_ms());
        }

        let result = results::decode(&body, content_type, status.as_u16(), elapsed_ms());
        debug!(
            rows = result.rows.len(),
            elapsed_ms = result.elapsed_ms,
            "query executed"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queryharvest_shared::ExecutionStatus;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, format: RequestFormat) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.endpoint = Url::parse(&format!("{}/sparql", server.uri())).unwrap();
        config.request_format = format;
        config.execution_timeout = Duration::from_secs(5);
        config.cookie = None;
        config
    }

    fn select_body() -> serde_json::Value {
        json!({
            "head": { "vars": ["n"] },
            "results": { "bindings": [
                { "n": { "type": "literal", "value": "1",
                         "datatype": "http://www.w3.org/2001/XMLSchema#integer" } }
            ] }
        })
    }

    #[tokio::test]
    async fn form_request_follows_protocol() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sparql"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("query=SELECT"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/sparql-results+json")
                    .set_body_json(select_body()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(&config_for(&server, RequestFormat::Form)).unwrap();
        let result = executor.execute("SELECT ?n WHERE {}", Some("q-1")).await;

        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.rows[0]["n"].datatype.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#integer")
        );
        assert_eq!(result.status_code, Some(200));
    }

    #[tokio::test]
    async fn json_request_carries_query_id_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sparql"))
            .and(header("x-t-queryid", "q-9"))
            .and(header("referer", "https://example.com/sparql"))
            .and(header("cookie", "session=abc"))
            .and(body_json(json!({ "query": "ASK {}" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "boolean": false })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server, RequestFormat::Json);
        config.referer = Some("https://example.com/sparql".into());
        config.cookie = Some("session=abc".into());
        let executor = SparqlExecutor::new(&config).unwrap();

        let result = executor.execute("ASK {}", Some("q-9")).await;
        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.boolean, Some(false));
    }

    #[tokio::test]
    async fn error_status_is_failed_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Parse error: line 1"))
            .expect(1)
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(&config_for(&server, RequestFormat::Form)).unwrap();
        let result = executor.execute("SELEC oops", None).await;

        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(result.status_code, Some(400));
        assert_eq!(result.error.as_deref(), Some("HTTP 400: Parse error: line 1"));
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(&config_for(&server, RequestFormat::Form)).unwrap();
        let result = executor.execute("SELECT * {}", None).await;
        assert!(result.is_failed());
    }

    #[tokio::test]
    async fn timeout_is_failed_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(select_body())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut config = config_for(&server, RequestFormat::Form);
        config.execution_timeout = Duration::from_millis(50);
        let executor = SparqlExecutor::new(&config).unwrap();

        let result = executor.execute("SELECT * {}", None).await;
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn disabled_executor_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(select_body()))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = config_for(&server, RequestFormat::Form);
        config.execute = false;
        let executor = SparqlExecutor::new(&config).unwrap();

        let result = executor.execute("SELECT * {}", None).await;
        assert_eq!(result.status, ExecutionStatus::Skipped);
    }

    #[tokio::test]
    async fn turtle_response_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<a> <b> <c> .\n", "text/turtle"),
            )
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(&config_for(&server, RequestFormat::Form)).unwrap();
        let result = executor.execute("CONSTRUCT WHERE { ?s ?p ?o }", None).await;

        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.content_type.as_deref(), Some("text/turtle"));
        assert_eq!(result.text_sample.as_deref(), Some("<a> <b> <c> ."));
    }
}
