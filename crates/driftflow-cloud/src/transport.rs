//! Transport contract between the engine and a control-plane API
//!
//! The engine never talks HTTP itself. It builds [`ApiRequest`]s and hands
//! them to a [`Transport`], which owns authentication, retries and status
//! mapping.

use crate::error::{ApiError, CloudError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Decides whether an API error is transient.
///
/// Returns the reason for retrying, or `None` when the error is final.
pub type RetryPredicate = fn(&ApiError) -> Option<&'static str>;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single API call
#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,

    /// Upper bound for the call including retries
    pub timeout: Option<Duration>,

    /// Extra retry predicates, consulted in addition to the transport defaults
    pub retry_predicates: Vec<RetryPredicate>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: BTreeMap::new(),
            timeout: None,
            retry_predicates: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_predicates(mut self, predicates: &[RetryPredicate]) -> Self {
        self.retry_predicates.extend_from_slice(predicates);
        self
    }

    /// First predicate that classifies `err` as retryable
    pub fn retry_reason(&self, err: &ApiError) -> Option<&'static str> {
        self.retry_predicates.iter().find_map(|p| p(err))
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body", &self.body)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("retry_predicates", &self.retry_predicates.len())
            .finish()
    }
}

/// Sends requests to the remote API.
///
/// Implementations must map HTTP 404 to [`CloudError::NotFound`], return
/// other non-success statuses as [`CloudError::Api`] once retries are
/// exhausted, and return `Ok(None)` for an empty success body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>> {
        (**self).send(request).await
    }
}

/// Send `request`, giving up as soon as `cancel` fires
pub async fn send_cancellable(
    transport: &dyn Transport,
    request: ApiRequest,
    cancel: &CancellationToken,
) -> Result<Option<Value>> {
    let what = format!("{} {}", request.method, request.url);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CloudError::Cancelled(what)),
        res = transport.send(request) => res,
    }
}

/// Merge `params` into the query string of `url`.
///
/// Keys already present are replaced, everything is percent-encoded.
pub fn add_query_params(url: &str, params: &BTreeMap<String, String>) -> Result<String> {
    if params.is_empty() {
        return Ok(url.to_string());
    }

    let mut parsed = url::Url::parse(url)
        .map_err(|e| CloudError::Validation(format!("invalid URL {:?}: {}", url, e)))?;

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !params.contains_key(k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut query = parsed.query_pairs_mut();
        query.clear();
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        for (k, v) in params {
            query.append_pair(k, v);
        }
    }

    Ok(parsed.into())
}

/// 429 quota errors, retried so that walking many pages does not fail on
/// rate limits
pub fn is_429_quota_error(err: &ApiError) -> Option<&'static str> {
    (err.code == 429).then_some("429s are retryable for quota errors")
}

/// IAM grants for a freshly created monitoring scope take a while to
/// propagate; the API reports that window as a 403
pub fn is_monitoring_permission_error(err: &ApiError) -> Option<&'static str> {
    (err.code == 403 && err.message.contains("does not have permission"))
        .then_some("monitoring permissions have not propagated yet")
}

/// Server-side failures that are safe to retry for any request
pub fn is_common_retryable_error(err: &ApiError) -> Option<&'static str> {
    matches!(err.code, 500 | 502 | 503).then_some("retryable server error")
}

/// Predicates every transport applies
pub const DEFAULT_RETRY_PREDICATES: &[RetryPredicate] = &[is_common_retryable_error];
