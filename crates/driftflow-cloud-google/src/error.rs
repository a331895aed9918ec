//! Google provider error types

use driftflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),
}

impl From<GoogleError> for CloudError {
    fn from(err: GoogleError) -> Self {
        match err {
            GoogleError::Cloud(e) => e,
            GoogleError::MissingEnvVar(var) => {
                CloudError::InvalidConfig(format!("missing environment variable {}", var))
            }
            GoogleError::InvalidConfig(msg) => CloudError::InvalidConfig(msg),
            GoogleError::Http(e) => CloudError::Transport(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GoogleError>;
