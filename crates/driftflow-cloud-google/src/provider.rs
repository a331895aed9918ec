//! Google provider implementation

use crate::config::GoogleConfig;
use crate::error::Result;
use crate::resources::{
    ComputeInstance, InstanceList, MonitoredProject, ResourceManagerResolver, VolumeQuotaRule,
    compute_instances,
};
use crate::transport::HttpTransport;
use driftflow_cloud::{
    CancellationToken, CloudError, ListFilter, ListSummary, ListableResource, Reconciler,
    ResourceDefinition, ResourceState, ResultSink,
};
use std::sync::Arc;

/// Google provider: one HTTP transport shared by every resource type
pub struct GoogleProvider {
    reconciler: Reconciler<Arc<HttpTransport>>,
    quota_rule: VolumeQuotaRule,
    monitored_project: MonitoredProject,
    compute_instance: ComputeInstance,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        let config = config.into_provider_config();
        let resolver = ResourceManagerResolver::new(transport.clone(), &config)?;

        Ok(Self {
            reconciler: Reconciler::new(transport, config),
            quota_rule: VolumeQuotaRule::new(),
            monitored_project: MonitoredProject::new(Arc::new(resolver)),
            compute_instance: ComputeInstance::new(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GoogleConfig::from_env()?)
    }

    pub fn name(&self) -> &str {
        "google"
    }

    pub fn reconciler(&self) -> &Reconciler<Arc<HttpTransport>> {
        &self.reconciler
    }

    /// Managed resource type by name
    pub fn definition(&self, resource_type: &str) -> Option<&dyn ResourceDefinition> {
        match resource_type {
            "netapp_volume_quota_rule" => Some(&self.quota_rule),
            "monitoring_monitored_project" => Some(&self.monitored_project),
            _ => None,
        }
    }

    /// Enumerable resource type by name
    pub fn listable(&self, resource_type: &str) -> Option<&dyn ListableResource> {
        match resource_type {
            "netapp_volume_quota_rule" => Some(&self.quota_rule),
            "compute_instance" => Some(&self.compute_instance),
            _ => None,
        }
    }

    /// Stream every resource of `resource_type` in `scope` to `sink`
    pub async fn list(
        &self,
        resource_type: &str,
        scope: &ResourceState,
        filter: Option<&ListFilter>,
        include_resource: bool,
        sink: &mut dyn ResultSink,
        cancel: &CancellationToken,
    ) -> driftflow_cloud::Result<ListSummary> {
        let def = self.listable(resource_type).ok_or_else(|| {
            CloudError::Validation(format!("{} cannot be listed", resource_type))
        })?;
        self.reconciler
            .lister()
            .list(def, scope, filter, include_resource, sink, cancel)
            .await
    }

    /// The `compute_instances` data source
    pub async fn compute_instances(
        &self,
        scope: &ResourceState,
        filter: Option<&ListFilter>,
        cancel: &CancellationToken,
    ) -> driftflow_cloud::Result<InstanceList> {
        compute_instances(&self.reconciler.lister(), scope, filter, cancel).await
    }
}
