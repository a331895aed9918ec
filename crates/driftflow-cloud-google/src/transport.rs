//! reqwest based transport for Google REST APIs
//!
//! Adds the user agent and bearer token to every call, maps HTTP statuses to
//! engine errors and retries transient failures with exponential backoff.

use crate::config::GoogleConfig;
use crate::error::Result;
use async_trait::async_trait;
use driftflow_cloud::transport::DEFAULT_RETRY_PREDICATES;
use driftflow_cloud::{ApiError, ApiRequest, CloudError, Method, RetryConfig, Transport};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

/// HTTP transport backed by a shared reqwest client
pub struct HttpTransport {
    client: reqwest::Client,
    access_token: Option<String>,
    retry: RetryConfig,
}

enum Failure {
    /// Connection could not be established or timed out
    Connection(reqwest::Error),
    Api(ApiError),
    Final(CloudError),
}

impl Failure {
    fn into_error(self) -> CloudError {
        match self {
            Failure::Connection(e) => CloudError::Transport(e.to_string()),
            Failure::Api(e) => CloudError::Api(e),
            Failure::Final(e) => e,
        }
    }
}

impl HttpTransport {
    pub fn new(config: &GoogleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.provider.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            access_token: config.access_token.clone(),
            retry: config.provider.retry.clone(),
        })
    }

    async fn send_once(
        &self,
        request: &ApiRequest,
        deadline: Option<Instant>,
    ) -> std::result::Result<Option<Value>, Failure> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(deadline) = deadline {
            builder = builder.timeout(deadline.saturating_duration_since(Instant::now()));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                Failure::Connection(e)
            } else {
                Failure::Final(CloudError::Transport(e.to_string()))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Failure::Final(CloudError::Transport(e.to_string())))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Failure::Final(CloudError::NotFound(request.url.clone())));
        }
        if !status.is_success() {
            return Err(Failure::Api(ApiError::from_body(status.as_u16(), &text)));
        }
        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| Failure::Final(CloudError::Json(e)))
    }
}

fn retry_reason(request: &ApiRequest, failure: &Failure) -> Option<&'static str> {
    match failure {
        Failure::Connection(_) => Some("connection error"),
        Failure::Api(api) => request
            .retry_reason(api)
            .or_else(|| DEFAULT_RETRY_PREDICATES.iter().find_map(|p| p(api))),
        Failure::Final(_) => None,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> driftflow_cloud::Result<Option<Value>> {
        let deadline = request.timeout.map(|t| Instant::now() + t);
        let mut attempt = 0;

        debug!(method = %request.method, url = %request.url, "sending request");

        loop {
            attempt += 1;
            let failure = match self.send_once(&request, deadline).await {
                Ok(body) => return Ok(body),
                Err(failure) => failure,
            };

            let Some(reason) = retry_reason(&request, &failure) else {
                return Err(failure.into_error());
            };
            if attempt >= self.retry.max_attempts {
                warn!(attempt, reason, url = %request.url, "giving up after retries");
                return Err(failure.into_error());
            }

            let delay = self.retry.delay_for_attempt(attempt - 1);
            if deadline.is_some_and(|d| Instant::now() + delay >= d) {
                return Err(failure.into_error());
            }

            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason,
                "retrying {} {}",
                request.method,
                request.url
            );
            tokio::time::sleep(delay).await;
        }
    }
}
