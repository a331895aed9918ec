//! Cloud engine error types

use crate::operation::OperationError;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by the reconciliation and listing engine
#[derive(Error, Debug)]
pub enum CloudError {
    /// The remote resource does not exist (HTTP 404 class). Never retried.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The API rejected the request and no retry predicate (or retry budget) applied.
    #[error("API error: {0}")]
    Api(ApiError),

    /// A long-running operation reached its terminal ERROR state.
    #[error("Error waiting for {activity}: {error}")]
    OperationFailed {
        activity: String,
        error: OperationError,
    },

    /// The caller-supplied deadline elapsed while an operation was still running.
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Malformed URL template, missing required field, bad import id.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Change requires replacement of: {}", .0.join(", "))]
    RequiresReplacement(Vec<String>),

    /// The remote state contradicts what the engine just did (e.g. a freshly
    /// created resource cannot be read back).
    #[error("Inconsistent remote state: {0}")]
    Inconsistent(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    /// The structured API error, if this is one
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            CloudError::Api(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

/// Structured error returned by the control-plane API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub code: u16,

    /// Human readable message from the error body
    pub message: String,

    /// Canonical status string (e.g. `RESOURCE_EXHAUSTED`)
    pub status: Option<String>,

    /// Machine readable reasons (`errors[].reason` and `details[].reason`)
    pub reasons: Vec<String>,

    /// Raw response body
    pub body: String,
}

impl ApiError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            reasons: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    /// Parse an error response body of the form
    /// `{"error": {"code", "message", "status", "errors": [..], "details": [..]}}`.
    ///
    /// Bodies that are not JSON keep the raw text as the message.
    pub fn from_body(code: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();

        let Some(ErrorEnvelope { error }) = parsed else {
            let message = if body.trim().is_empty() {
                format!("HTTP {}", code)
            } else {
                body.trim().to_string()
            };
            return Self {
                code,
                message,
                status: None,
                reasons: Vec::new(),
                body: body.to_string(),
            };
        };

        let reasons = error
            .errors
            .iter()
            .filter_map(|e| e.reason.clone())
            .chain(error.details.iter().filter_map(|d| d.reason.clone()))
            .collect();

        Self {
            code,
            message: error.message,
            status: error.status,
            reasons,
            body: body.to_string(),
        }
    }

    pub fn has_reason(&self, reason: &str) -> bool {
        self.reasons.iter().any(|r| r == reason)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)?;
        if let Some(status) = &self.status {
            write!(f, " ({})", status)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
    #[serde(default)]
    details: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: Option<String>,
}
