//! Environment driven provider configuration

use crate::error::{GoogleError, Result};
use driftflow_cloud::ProviderConfig;

/// Service endpoints: template variable, environment suffix, default URL
pub const SERVICES: &[(&str, &str, &str)] = &[
    (
        "ComputeBasePath",
        "COMPUTE",
        "https://compute.googleapis.com/compute/v1/",
    ),
    (
        "MonitoringBasePath",
        "MONITORING",
        "https://monitoring.googleapis.com/",
    ),
    ("NetappBasePath", "NETAPP", "https://netapp.googleapis.com/v1/"),
    (
        "ResourceManagerBasePath",
        "RESOURCE_MANAGER",
        "https://cloudresourcemanager.googleapis.com/v1/",
    ),
];

/// Configuration for the Google provider
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub provider: ProviderConfig,

    /// OAuth2 access token sent as a bearer token; obtaining it is up to the caller
    pub access_token: Option<String>,
}

impl GoogleConfig {
    /// Configuration with the public endpoints of every service
    pub fn new(project: impl Into<String>) -> Self {
        let mut provider = ProviderConfig::new().with_project(project);
        for (key, _, default) in SERVICES {
            provider = provider.with_base_path(*key, *default);
        }
        Self {
            provider,
            access_token: None,
        }
    }

    /// Create GoogleConfig from environment variables
    ///
    /// `GOOGLE_PROJECT` is required; `GOOGLE_REGION`, `GOOGLE_ZONE` and
    /// `GOOGLE_ACCESS_TOKEN` are optional. `DRIFTFLOW_<SERVICE>_BASE_PATH`
    /// overrides a service endpoint.
    pub fn from_env() -> Result<Self> {
        let project = std::env::var("GOOGLE_PROJECT")
            .map_err(|_| GoogleError::MissingEnvVar("GOOGLE_PROJECT".to_string()))?;

        let mut config = Self::new(project);
        config.provider.region = optional_var("GOOGLE_REGION");
        config.provider.zone = optional_var("GOOGLE_ZONE");
        config.access_token = optional_var("GOOGLE_ACCESS_TOKEN");

        for (key, service, _) in SERVICES {
            let var = format!("DRIFTFLOW_{}_BASE_PATH", service);
            if let Some(url) = optional_var(&var) {
                config = config.with_base_path(key, &url)?;
            }
        }

        Ok(config)
    }

    /// Point a service at another endpoint (e.g. a local emulator)
    pub fn with_base_path(mut self, key: &str, url: &str) -> Result<Self> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(GoogleError::InvalidConfig(format!(
                "base path for {} must be an http(s) URL: {}",
                key, url
            )));
        }
        let url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{}/", url)
        };
        self.provider = self.provider.with_base_path(key, url);
        Ok(self)
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn into_provider_config(self) -> ProviderConfig {
        self.provider
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
