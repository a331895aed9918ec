//! Monitoring monitored project
//!
//! A monitored project has no URL of its own: reads fetch the whole metrics
//! scope and look the project up among `monitoredProjects`. The API names
//! members by project number, so the configured project id or number is
//! resolved through Resource Manager before matching.

use async_trait::async_trait;
use driftflow_cloud::transport::{is_monitoring_permission_error, send_cancellable};
use driftflow_cloud::{
    ApiRequest, CancellationToken, CloudError, FieldSchema, ProjectNameOrNumber, ProviderConfig,
    ResourceDefinition, ResourceKind, ResourceNameEquivalence, ResourceSchema, ResourceState,
    Result, RetryPredicate, Transport,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Maps a project id or number to its project number
#[async_trait]
pub trait ProjectResolver: Send + Sync {
    async fn project_number(&self, project: &str, cancel: &CancellationToken) -> Result<String>;
}

/// Resolves projects with the Resource Manager `projects.get` call
pub struct ResourceManagerResolver<T> {
    transport: T,
    base_path: String,
}

impl<T: Transport> ResourceManagerResolver<T> {
    pub fn new(transport: T, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            transport,
            base_path: config.base_path("ResourceManagerBasePath")?.to_string(),
        })
    }
}

#[async_trait]
impl<T: Transport> ProjectResolver for ResourceManagerResolver<T> {
    async fn project_number(&self, project: &str, cancel: &CancellationToken) -> Result<String> {
        let url = format!("{}projects/{}", self.base_path, project);
        let response = send_cancellable(&self.transport, ApiRequest::get(url), cancel)
            .await?
            .unwrap_or_default();

        match response.get("projectNumber") {
            Some(Value::String(n)) => Ok(n.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(CloudError::Inconsistent(format!(
                "project {} has no projectNumber",
                project
            ))),
        }
    }
}

/// `monitoring_monitored_project`: a project added to a metrics scope
pub struct MonitoredProject {
    schema: ResourceSchema,
    resolver: Arc<dyn ProjectResolver>,
}

impl MonitoredProject {
    pub fn new(resolver: Arc<dyn ProjectResolver>) -> Self {
        Self {
            schema: ResourceSchema::new(vec![
                FieldSchema::required("metrics_scope")
                    .force_new()
                    .url_param()
                    .self_link()
                    .equivalence(ResourceNameEquivalence),
                FieldSchema::required("name")
                    .force_new()
                    .url_param()
                    .self_link()
                    .equivalence(ProjectNameOrNumber),
                FieldSchema::computed("create_time").api_name("createTime"),
            ]),
            resolver,
        }
    }
}

impl ResourceKind for MonitoredProject {
    fn resource_type(&self) -> &str {
        "monitoring_monitored_project"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    fn id_template(&self) -> &str {
        "locations/global/metricsScopes/{{metrics_scope}}/projects/{{name}}"
    }

    fn retry_predicates(&self) -> &[RetryPredicate] {
        &[is_monitoring_permission_error]
    }
}

#[async_trait]
impl ResourceDefinition for MonitoredProject {
    fn base_path_key(&self) -> &str {
        "MonitoringBasePath"
    }

    fn create_url(&self) -> &str {
        "{{MonitoringBasePath}}v1/locations/global/metricsScopes/{{metrics_scope}}/projects"
    }

    fn read_url(&self) -> &str {
        "{{MonitoringBasePath}}v1/locations/global/metricsScopes/{{metrics_scope}}"
    }

    fn delete_url(&self) -> &str {
        "{{MonitoringBasePath}}v1/locations/global/metricsScopes/{{metrics_scope}}/projects/{{name}}"
    }

    fn import_formats(&self) -> &[&'static str] {
        &[
            "locations/global/metricsScopes/{{metrics_scope}}/projects/{{name}}",
            "v1/locations/global/metricsScopes/{{metrics_scope}}/projects/{{name}}",
            "{{metrics_scope}}/{{name}}",
        ]
    }

    fn supports_update(&self) -> bool {
        false
    }

    // operation names are relative to the API version
    fn operation_base_url(&self, config: &ProviderConfig) -> Result<String> {
        Ok(format!("{}v1/", config.base_path(self.base_path_key())?))
    }

    fn encode(
        &self,
        desired: &ResourceState,
        mut payload: Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let scope = desired.get_str("metrics_scope").unwrap_or_default();
        let name = desired.get_str("name").unwrap_or_default();
        payload.insert(
            "name".to_string(),
            Value::String(format!(
                "locations/global/metricsScopes/{}/projects/{}",
                scope, name
            )),
        );
        Ok(payload)
    }

    async fn decode(
        &self,
        state: &ResourceState,
        response: Value,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>> {
        let project = state.get_str("name").unwrap_or_default();
        let number = self.resolver.project_number(project, cancel).await?;
        let suffix = format!("/{}", number);
        debug!(project, number = %number, "scanning metrics scope for project number");

        let found = response
            .get("monitoredProjects")
            .and_then(Value::as_array)
            .and_then(|members| {
                members.iter().find(|m| {
                    m.get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|n| n.ends_with(&suffix))
                })
            })
            .cloned();

        if found.is_none() {
            debug!(project, "project is not monitored by this metrics scope");
        }
        Ok(found)
    }
}
