//! Google Cloud provider for driftflow
//!
//! This crate plugs Google's REST control planes into the `driftflow-cloud`
//! engine: an HTTP transport, environment configuration and a set of resource
//! definitions.
//!
//! # Features
//!
//! - NetApp volume quota rules (create, read, update, delete, import, list)
//! - Monitoring monitored projects (create, read, delete, import)
//! - Compute Engine instance listing and the `compute_instances` data source
//!
//! # Requirements
//!
//! - `GOOGLE_PROJECT` env var, optionally `GOOGLE_REGION` and `GOOGLE_ZONE`
//! - `GOOGLE_ACCESS_TOKEN` with an OAuth2 access token (e.g. from
//!   `gcloud auth print-access-token`)
//!
//! # Example
//!
//! ```ignore
//! use driftflow_cloud::{CancellationToken, ListFilter, ResourceState, VecSink};
//! use driftflow_cloud_google::GoogleProvider;
//!
//! let provider = GoogleProvider::from_env()?;
//! let scope = ResourceState::new().with_attribute("zone", "us-central1-a");
//!
//! let mut sink = VecSink::default();
//! provider
//!     .list(
//!         "compute_instance",
//!         &scope,
//!         Some(&ListFilter::new().and_eq("status", "RUNNING")),
//!         false,
//!         &mut sink,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//!
//! for result in &sink.results {
//!     println!("{}", result.display_name);
//! }
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod resources;
pub mod transport;

pub use config::GoogleConfig;
pub use error::{GoogleError, Result};
pub use provider::GoogleProvider;
pub use resources::{
    ComputeInstance, InstanceList, MonitoredProject, ProjectResolver, ResourceManagerResolver,
    VolumeQuotaRule, compute_instances,
};
pub use transport::HttpTransport;
