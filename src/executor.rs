//! Outbound request execution.
//!
//! [`RequestExecutor`] is the only place raw HTTP and JSON bodies are
//! handled. It retries a request when the connection could not be
//! established in time, and hands every completed response back to the
//! caller untouched, whatever its status. Interpreting the status is the
//! caller's job (see [`ApiResponse::expect_status`]).

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::error::{ConduitError, Result};
use crate::retry::RetryPolicy;

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// JSON document.
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
}

/// A single outbound call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Query string pairs, in order.
    pub query: Vec<(String, String)>,
    /// Optional body.
    pub body: Option<Body>,
}

impl ApiRequest {
    /// Creates a request with no headers, query or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a query pair. Empty values are kept (`after=` is meaningful).
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(Body::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    /// Sets a form body.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Some(Body::Form(
            fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ));
        self
    }
}

/// A completed response, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

impl ApiResponse {
    /// Returns `true` for the statuses the remote service uses for success.
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 202 | 204)
    }

    /// Converts the response into an [`ConduitError::Api`] unless its
    /// status is `expected`.
    pub fn expect_status(self, expected: u16) -> Result<Self> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(ConduitError::api(self.status, self.body))
        }
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Issues outbound calls with bounded retry on connect timeouts.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    retry: RetryPolicy,
}

impl RequestExecutor {
    /// Creates an executor with the given timeouts and the default retry
    /// policy (3 attempts, 1 second apart).
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self::with_client(client, RetryPolicy::default()))
    }

    /// Creates an executor with a pre-configured HTTP client.
    ///
    /// Useful for testing or when custom client configuration is needed.
    pub fn with_client(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Returns the retry policy in use.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Sends a request, retrying only when the connection times out.
    ///
    /// Non-success statuses are returned as `Ok`; nothing that reached the
    /// server is retried.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let operation = format!("{} {}", request.method, request.url);
        self.retry
            .execute(&operation, || self.send_once(request))
            .await
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse> {
        log::debug!("{} {}", request.method, request.url);

        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            Some(Body::Json(value)) => builder.json(value),
            Some(Body::Form(fields)) => builder.form(fields),
            None => builder,
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        log::debug!("{} {} -> {}", request.method, request.url, status);
        Ok(ApiResponse { status, body })
    }
}

/// Connect timeouts become retryable; everything else is final.
fn classify(err: reqwest::Error) -> ConduitError {
    if is_retryable(err.is_connect(), err.is_timeout()) {
        ConduitError::TransientNetwork {
            attempts: 1,
            message: err.to_string(),
        }
    } else {
        ConduitError::Http(err)
    }
}

/// Only a connection that never got established in time may be replayed.
/// A timeout after connecting means the server may have seen the request.
fn is_retryable(connect: bool, timeout: bool) -> bool {
    connect && timeout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses() {
        for status in [200, 202, 204] {
            let response = ApiResponse {
                status,
                body: String::new(),
            };
            assert!(response.is_success(), "{status} should be success");
        }
        let response = ApiResponse {
            status: 201,
            body: String::new(),
        };
        assert!(!response.is_success());
    }

    #[test]
    fn test_expect_status_carries_body() {
        let response = ApiResponse {
            status: 400,
            body: r#"{"message":"bad shard"}"#.to_string(),
        };
        match response.expect_status(202) {
            Err(ConduitError::Api { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, r#"{"message":"bad shard"}"#);
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn test_request_builder_keeps_empty_query_values() {
        let request = ApiRequest::new(Method::GET, "http://localhost/x")
            .query("conduit_id", "abc")
            .query("after", "");
        assert_eq!(
            request.query,
            vec![
                ("conduit_id".to_string(), "abc".to_string()),
                ("after".to_string(), String::new()),
            ]
        );
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_retried() {
        // Port 1 is reserved and nothing listens on it; refusal is not a timeout.
        let executor = RequestExecutor::new(Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        let request = ApiRequest::new(Method::GET, "http://127.0.0.1:1/");

        let started = std::time::Instant::now();
        let result = executor.send(&request).await;
        assert!(matches!(result, Err(ConduitError::Http(_))), "{result:?}");
        assert!(started.elapsed() < crate::constants::RETRY_DELAY);
    }

    #[test]
    fn test_only_connect_timeouts_are_retryable() {
        assert!(is_retryable(true, true));
        assert!(!is_retryable(false, true));
        assert!(!is_retryable(true, false));
        assert!(!is_retryable(false, false));
    }

    #[tokio::test]
    async fn test_response_timeout_is_not_retried() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_secs(3)))
            .expect(1)
            .mount(&server)
            .await;

        let executor =
            RequestExecutor::new(Duration::from_millis(200), Duration::from_secs(5)).unwrap();
        let request = ApiRequest::new(Method::PATCH, format!("{}/eventsub/conduits/shards", server.uri()));

        match executor.send(&request).await {
            Err(ConduitError::Http(err)) => assert!(err.is_timeout() && !err.is_connect()),
            other => panic!("expected a final timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_form_body() {
        let request = ApiRequest::new(Method::POST, "http://localhost/token")
            .form(&[("grant_type", "client_credentials")]);
        assert_eq!(
            request.body,
            Some(Body::Form(vec![(
                "grant_type".to_string(),
                "client_credentials".to_string()
            )]))
        );
    }
}
