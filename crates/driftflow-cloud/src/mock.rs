//! Scripted in-memory transport for tests
//!
//! Expectations are consumed in order. A request that does not match the
//! next expectation (or arrives when none is left) fails with
//! [`CloudError::Transport`], so unexpected network calls surface as errors.

use crate::error::{ApiError, CloudError, Result};
use crate::transport::{ApiRequest, Method, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted reply for one expected request
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    /// Success with an empty body
    Empty,
    NotFound,
    Api(ApiError),
    /// Never answers
    Hang,
}

#[derive(Debug)]
struct Expectation {
    method: Method,
    url_part: String,
    reply: Reply,
}

#[derive(Debug, Default)]
struct Inner {
    expectations: VecDeque<Expectation>,
    requests: Vec<ApiRequest>,
}

/// In-memory [`Transport`] returning scripted replies
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Mutex<Inner>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a `method` request whose URL contains `url_part`
    pub fn expect(&self, method: Method, url_part: impl Into<String>, reply: Reply) {
        self.lock().expectations.push_back(Expectation {
            method,
            url_part: url_part.into(),
            reply,
        });
    }

    pub fn expect_get(&self, url_part: impl Into<String>, body: Value) {
        self.expect(Method::Get, url_part, Reply::Json(body));
    }

    pub fn expect_hang(&self, url_part: impl Into<String>) {
        self.expect(Method::Get, url_part, Reply::Hang);
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    /// Panics if scripted replies were left unused
    pub fn assert_done(&self) {
        let inner = self.lock();
        assert!(
            inner.expectations.is_empty(),
            "unused expectations: {:?}",
            inner.expectations
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // a panicking test must not hide the recorded requests from others
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>> {
        let reply = {
            let mut inner = self.lock();
            inner.requests.push(request.clone());

            let Some(next) = inner.expectations.pop_front() else {
                return Err(CloudError::Transport(format!(
                    "unexpected request: {} {}",
                    request.method, request.url
                )));
            };
            if next.method != request.method || !request.url.contains(&next.url_part) {
                return Err(CloudError::Transport(format!(
                    "expected {} *{}*, got {} {}",
                    next.method, next.url_part, request.method, request.url
                )));
            }
            next.reply
        };

        match reply {
            Reply::Json(body) => Ok(Some(body)),
            Reply::Empty => Ok(None),
            Reply::NotFound => Err(CloudError::NotFound(request.url)),
            Reply::Api(err) => Err(CloudError::Api(err)),
            Reply::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let transport = MockTransport::new();
        transport.expect_get("/a", json!({"n": 1}));
        transport.expect(Method::Delete, "/b", Reply::NotFound);

        let first = transport.send(ApiRequest::get("https://x.test/a")).await.unwrap();
        assert_eq!(first, Some(json!({"n": 1})));

        let second = transport
            .send(ApiRequest::new(Method::Delete, "https://x.test/b"))
            .await;
        assert!(second.unwrap_err().is_not_found());

        let third = transport.send(ApiRequest::get("https://x.test/c")).await;
        assert!(matches!(third, Err(CloudError::Transport(_))));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_mismatch_is_an_error() {
        let transport = MockTransport::new();
        transport.expect(Method::Post, "/things", Reply::Empty);

        let res = transport.send(ApiRequest::get("https://x.test/things")).await;
        assert!(matches!(res, Err(CloudError::Transport(_))));
    }
}
