//! Long-running operation handles and the waiter that polls them
//!
//! Mutations on the control plane return an operation instead of the final
//! resource. [`OperationWaiter::wait`] polls it with exponential backoff until
//! it reaches a terminal state, the deadline passes or the caller cancels.

use crate::config::PollConfig;
use crate::error::{CloudError, Result};
use crate::transport::{ApiRequest, Transport};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lifecycle state of a long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Running,
    Done,
    Error,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Done | OperationState::Error)
    }
}

/// Error payload of a failed operation, as reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct OperationError {
    pub code: Option<i64>,
    pub message: String,

    /// Raw `error` object
    pub details: Value,
}

impl OperationError {
    fn from_value(error: &Value) -> Self {
        // compute operations: {"errors": [{"code": "QUOTA_EXCEEDED", "message": ".."}]}
        if let Some(errors) = error.get("errors").and_then(Value::as_array) {
            let message = errors
                .iter()
                .map(|e| {
                    let code = e.get("code").and_then(Value::as_str).unwrap_or("UNKNOWN");
                    let msg = e.get("message").and_then(Value::as_str).unwrap_or_default();
                    format!("{}: {}", code, msg)
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Self {
                code: None,
                message,
                details: error.clone(),
            };
        }

        Self {
            code: error.get("code").and_then(Value::as_i64),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("operation failed")
                .to_string(),
            details: error.clone(),
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Handle to a long-running operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationHandle {
    pub name: String,
    pub self_link: Option<String>,
    pub state: OperationState,
    pub error: Option<OperationError>,

    /// Result payload of a finished operation, if the API returns one
    pub response: Option<Value>,
}

impl OperationHandle {
    /// Parse an operation from an API response.
    ///
    /// Understands both the `done`/`error`/`response` shape and the
    /// `status: PENDING | RUNNING | DONE` shape used by compute.
    pub fn from_response(value: &Value) -> Result<Self> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CloudError::Inconsistent(format!("operation response has no name: {}", value))
            })?
            .to_string();
        let self_link = value
            .get("selfLink")
            .and_then(Value::as_str)
            .map(str::to_string);

        let error = value.get("error").filter(|e| !e.is_null());

        let state = match value.get("status").and_then(Value::as_str) {
            Some("PENDING") => OperationState::Pending,
            Some("RUNNING") => OperationState::Running,
            Some("DONE") if error.is_some() => OperationState::Error,
            Some("DONE") => OperationState::Done,
            Some(other) => {
                return Err(CloudError::Inconsistent(format!(
                    "unknown operation status {:?} for {}",
                    other, name
                )));
            }
            None => match value.get("done").and_then(Value::as_bool) {
                Some(true) if error.is_some() => OperationState::Error,
                Some(true) => OperationState::Done,
                _ => OperationState::Running,
            },
        };

        Ok(Self {
            name,
            self_link,
            state,
            error: error.map(OperationError::from_value),
            response: value.get("response").filter(|r| !r.is_null()).cloned(),
        })
    }

    fn poll_url(&self, base_url: &str) -> String {
        match &self.self_link {
            Some(link) => link.clone(),
            None => format!("{}{}", base_url, self.name),
        }
    }
}

/// Polls operations to completion
#[derive(Debug, Clone, Default)]
pub struct OperationWaiter {
    poll: PollConfig,
}

impl OperationWaiter {
    pub fn new(poll: PollConfig) -> Self {
        Self { poll }
    }

    /// Wait for `handle` to finish.
    ///
    /// `base_url` is prefixed to the operation name to build the poll URL
    /// unless the operation carries a `selfLink`. Every sleep and every poll is
    /// bounded by `timeout` and raced against `cancel`.
    ///
    /// # Returns
    /// * `Ok(response)` - the operation finished; its response payload, if any
    /// * `Err(OperationFailed)` - the operation reached its error state
    /// * `Err(Timeout)` / `Err(Cancelled)` - gave up before a terminal state
    pub async fn wait(
        &self,
        transport: &dyn Transport,
        base_url: &str,
        mut handle: OperationHandle,
        activity: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>> {
        let deadline = Instant::now() + timeout;
        let url = handle.poll_url(base_url);
        let mut attempt: u32 = 0;

        loop {
            match handle.state {
                OperationState::Done => {
                    info!(operation = %handle.name, polls = attempt, "{} finished", activity);
                    return Ok(handle.response);
                }
                OperationState::Error => {
                    let error = handle.error.unwrap_or_else(|| OperationError {
                        code: None,
                        message: "operation failed without an error payload".to_string(),
                        details: Value::Null,
                    });
                    return Err(CloudError::OperationFailed {
                        activity: activity.to_string(),
                        error,
                    });
                }
                OperationState::Pending | OperationState::Running => {}
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out(activity, &handle.name, timeout));
            }

            let delay = self.poll.delay_for_attempt(attempt).min(remaining);
            debug!(operation = %handle.name, attempt, ?delay, "operation still running");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(activity, &handle.name)),
                _ = sleep(delay) => {}
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out(activity, &handle.name, timeout));
            }

            let request = ApiRequest::get(url.clone()).with_timeout(remaining);
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(activity, &handle.name)),
                res = tokio::time::timeout(remaining, transport.send(request)) => match res {
                    Ok(res) => res?,
                    Err(_) => return Err(timed_out(activity, &handle.name, timeout)),
                },
            };
            attempt += 1;

            let value = polled.ok_or_else(|| {
                CloudError::Inconsistent(format!("empty response polling {}", handle.name))
            })?;
            handle = OperationHandle::from_response(&value)?;
        }
    }
}

fn timed_out(activity: &str, name: &str, timeout: Duration) -> CloudError {
    CloudError::Timeout(format!(
        "{} ({}) did not finish within {:?}",
        activity, name, timeout
    ))
}

fn cancelled(activity: &str, name: &str) -> CloudError {
    CloudError::Cancelled(format!("{} ({})", activity, name))
}
