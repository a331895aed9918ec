//! Provider configuration shared by every engine component

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration the engine needs to address and pace API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Default project, used when a resource does not set `project`
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub zone: Option<String>,

    /// Service base URLs keyed by template variable (e.g. `NetappBasePath`)
    #[serde(default)]
    pub base_paths: BTreeMap<String, String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_user_agent() -> String {
    format!("driftflow/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            project: None,
            region: None,
            zone: None,
            base_paths: BTreeMap::new(),
            user_agent: default_user_agent(),
            timeouts: Timeouts::default(),
            poll: PollConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_base_path(mut self, key: impl Into<String>, url: impl Into<String>) -> Self {
        self.base_paths.insert(key.into(), url.into());
        self
    }

    /// Base URL for a `{{...BasePath}}` template variable
    pub fn base_path(&self, key: &str) -> Result<&str> {
        self.base_paths
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| CloudError::InvalidConfig(format!("no base path configured for {}", key)))
    }

    /// Provider-level default for a location-like field
    pub fn default_var(&self, field: &str) -> Option<&str> {
        match field {
            "project" => self.project.as_deref(),
            "region" => self.region.as_deref(),
            "zone" => self.zone.as_deref(),
            _ => None,
        }
    }
}

/// Per-lifecycle-step deadlines, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_timeout_secs")]
    pub create_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub update_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub delete_secs: u64,
}

fn default_timeout_secs() -> u64 {
    20 * 60
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_secs: default_timeout_secs(),
            update_secs: default_timeout_secs(),
            delete_secs: default_timeout_secs(),
        }
    }
}

impl Timeouts {
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update_secs)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete_secs)
    }
}

/// Operation polling backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// 初回ポーリング間隔（ミリ秒）
    #[serde(default = "default_poll_initial")]
    pub initial_delay_ms: u64,
    /// 最大ポーリング間隔（ミリ秒）
    #[serde(default = "default_poll_max")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_poll_initial() -> u64 {
    1000
}
fn default_poll_max() -> u64 {
    10000
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_poll_initial(),
            max_delay_ms: default_poll_max(),
            multiplier: default_multiplier(),
        }
    }
}

impl PollConfig {
    /// Delay before the poll numbered `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        backoff(self.initial_delay_ms, self.max_delay_ms, self.multiplier, attempt)
    }
}

/// Retry configuration for transient API errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_initial")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_retry_max")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_retry_initial() -> u64 {
    500
}
fn default_retry_max() -> u64 {
    30000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_retry_initial(),
            max_delay_ms: default_retry_max(),
            backoff_multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        backoff(
            self.initial_delay_ms,
            self.max_delay_ms,
            self.backoff_multiplier,
            attempt,
        )
    }
}

fn backoff(initial_ms: u64, max_ms: u64, multiplier: f64, attempt: u32) -> Duration {
    let delay = initial_ms as f64 * multiplier.powi(attempt as i32);
    Duration::from_millis((delay as u64).min(max_ms))
}
