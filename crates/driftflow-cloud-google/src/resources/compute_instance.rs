//! Compute Engine instances: listing and the plural data source

use driftflow_cloud::template::replace_vars;
use driftflow_cloud::{
    CancellationToken, FieldSchema, Fixed64Codec, ListFilter, ListableResource, Lister,
    ResourceKind, ResourceSchema, ResourceState, Result,
};
use tracing::debug;

/// `compute_instance`, as enumerated zone by zone
pub struct ComputeInstance {
    schema: ResourceSchema,
}

impl ComputeInstance {
    pub fn new() -> Self {
        Self {
            schema: ResourceSchema::new(vec![
                FieldSchema::optional_computed("project").url_param(),
                FieldSchema::required("zone").url_param().self_link(),
                FieldSchema::required("name"),
                FieldSchema::optional("machine_type")
                    .api_name("machineType")
                    .self_link(),
                FieldSchema::optional("description"),
                FieldSchema::optional("labels"),
                FieldSchema::computed("instance_id")
                    .api_name("id")
                    .codec(Fixed64Codec),
                FieldSchema::computed("status"),
                FieldSchema::computed("cpu_platform").api_name("cpuPlatform"),
                FieldSchema::computed("creation_timestamp").api_name("creationTimestamp"),
                FieldSchema::computed("self_link").api_name("selfLink"),
            ]),
        }
    }
}

impl Default for ComputeInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for ComputeInstance {
    fn resource_type(&self) -> &str {
        "compute_instance"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    fn id_template(&self) -> &str {
        "projects/{{project}}/zones/{{zone}}/instances/{{name}}"
    }
}

impl ListableResource for ComputeInstance {
    fn list_url(&self) -> &str {
        "{{ComputeBasePath}}projects/{{project}}/zones/{{zone}}/instances"
    }
}

/// Result of the `compute_instances` data source
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceList {
    /// `projects/{project}/zones/{zone}/instances`
    pub id: String,
    pub instances: Vec<ResourceState>,
}

/// Every instance of a zone, optionally narrowed by `filter`.
///
/// `scope` must set `zone`; `project` falls back to the provider default.
/// Unset attributes are left out of each instance.
pub async fn compute_instances(
    lister: &Lister<'_>,
    scope: &ResourceState,
    filter: Option<&ListFilter>,
    cancel: &CancellationToken,
) -> Result<InstanceList> {
    let def = ComputeInstance::new();
    let id = replace_vars(
        scope,
        lister.config(),
        "projects/{{project}}/zones/{{zone}}/instances",
    )?;

    let mut instances = lister.collect(&def, scope, filter, cancel).await?;
    for instance in &mut instances {
        let unset: Vec<String> = instance
            .attributes()
            .iter()
            .filter(|(_, v)| v.is_null())
            .map(|(k, _)| k.clone())
            .collect();
        for key in unset {
            instance.remove(&key);
        }
    }

    debug!(id = %id, count = instances.len(), "read compute instances");
    Ok(InstanceList { id, instances })
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftflow_cloud::mock::MockTransport;
    use driftflow_cloud::{CloudError, FilterOp, ProviderConfig, VecSink};
    use serde_json::{Value, json};

    fn config() -> ProviderConfig {
        ProviderConfig::new()
            .with_project("p")
            .with_base_path("ComputeBasePath", "https://compute.test/compute/v1/")
    }

    fn instance(name: &str, id: &str) -> Value {
        json!({
            "name": name,
            "id": id,
            "machineType": "https://compute.test/compute/v1/projects/p/zones/us-central1-a/machineTypes/e2-medium",
            "zone": "https://compute.test/compute/v1/projects/p/zones/us-central1-a",
            "status": "RUNNING",
            "selfLink": format!("https://compute.test/compute/v1/projects/p/zones/us-central1-a/instances/{}", name)
        })
    }

    fn scope() -> ResourceState {
        ResourceState::new().with_attribute("zone", "us-central1-a")
    }

    #[tokio::test]
    async fn test_list_instances_across_pages() {
        let transport = MockTransport::new();
        transport.expect_get(
            "projects/p/zones/us-central1-a/instances",
            json!({"items": [instance("vm-1", "101")], "nextPageToken": "page-2"}),
        );
        transport.expect_get(
            "pageToken=page-2",
            json!({"items": [instance("vm-2", "not-a-number"), instance("vm-3", "103")]}),
        );

        let config = config();
        let mut sink = VecSink::default();
        let summary = Lister::new(&transport, &config)
            .list(
                &ComputeInstance::new(),
                &scope(),
                Some(&ListFilter::new().and("status", FilterOp::Ne, "TERMINATED")),
                true,
                &mut sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.pushed, 3);
        assert_eq!(summary.diagnostics, 1);

        let vm1 = sink.results[0].resource.as_ref().unwrap();
        assert_eq!(vm1.get_str("machine_type"), Some("e2-medium"));
        assert_eq!(vm1.get_str("zone"), Some("us-central1-a"));
        assert_eq!(vm1.get("instance_id"), Some(&json!(101)));

        assert_eq!(sink.results[1].display_name, "vm-2");
        assert!(sink.results[1].has_errors());
        assert_eq!(
            sink.results[2].identity.as_ref().unwrap().as_str(),
            "projects/p/zones/us-central1-a/instances/vm-3"
        );

        // the filter is repeated on every page
        for request in transport.requests() {
            assert!(request.url.contains("filter="), "{}", request.url);
        }
    }

    #[tokio::test]
    async fn test_data_source_drops_unset_attributes() {
        let transport = MockTransport::new();
        transport.expect_get("instances", json!({"items": [instance("vm-1", "101")]}));

        let config = config();
        let list = compute_instances(
            &Lister::new(&transport, &config),
            &scope(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(list.id, "projects/p/zones/us-central1-a/instances");
        assert_eq!(list.instances.len(), 1);
        let vm = &list.instances[0];
        assert_eq!(vm.get_str("project"), Some("p"));
        assert!(vm.get("description").is_none());
        assert!(vm.get("cpu_platform").is_none());
    }

    #[tokio::test]
    async fn test_data_source_requires_zone() {
        let transport = MockTransport::new();
        let config = config();
        let err = compute_instances(
            &Lister::new(&transport, &config),
            &ResourceState::new(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CloudError::Validation(_)));
        assert!(transport.requests().is_empty());
    }
}
