//! Resource definitions served by the Google provider

pub mod compute_instance;
pub mod monitored_project;
pub mod netapp_quota_rule;

pub use compute_instance::{ComputeInstance, InstanceList, compute_instances};
pub use monitored_project::{MonitoredProject, ProjectResolver, ResourceManagerResolver};
pub use netapp_quota_rule::VolumeQuotaRule;
