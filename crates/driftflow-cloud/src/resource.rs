//! Resource type definitions
//!
//! A resource type plugs into the engine by describing its schema and URL
//! templates. Lifecycle management goes through [`ResourceDefinition`],
//! enumeration through [`ListableResource`]; both build on [`ResourceKind`].

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::names::resource_name_from_self_link;
use crate::schema::ResourceSchema;
use crate::state::ResourceState;
use crate::transport::RetryPredicate;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// What every resource type provides
pub trait ResourceKind: Send + Sync {
    /// Type name (e.g. `netapp_volume_quota_rule`)
    fn resource_type(&self) -> &str;

    fn schema(&self) -> &ResourceSchema;

    /// `{{field}}` template of the resource identity
    fn id_template(&self) -> &str;

    /// Retry predicates added to every request for this type
    fn retry_predicates(&self) -> &[RetryPredicate] {
        &[]
    }

    /// Human readable name of a raw API object
    fn display_name(&self, item: &Value) -> String {
        item.get("name")
            .and_then(Value::as_str)
            .map(|n| resource_name_from_self_link(n).to_string())
            .unwrap_or_default()
    }
}

/// A resource type with a create/read/update/delete lifecycle
#[async_trait]
pub trait ResourceDefinition: ResourceKind {
    /// Template variable of the service base URL (e.g. `NetappBasePath`)
    fn base_path_key(&self) -> &str;

    fn create_url(&self) -> &str;

    fn read_url(&self) -> &str;

    fn update_url(&self) -> &str {
        self.read_url()
    }

    fn delete_url(&self) -> &str {
        self.read_url()
    }

    /// `{{field}}` segment patterns accepted by import, tried in order
    fn import_formats(&self) -> &[&'static str] {
        &[]
    }

    /// Whether mutations return a long-running operation
    fn is_async(&self) -> bool {
        true
    }

    fn supports_update(&self) -> bool {
        true
    }

    /// URL prefix for polling operations by name
    fn operation_base_url(&self, config: &ProviderConfig) -> Result<String> {
        config.base_path(self.base_path_key()).map(str::to_string)
    }

    /// Last chance to rewrite a create or update body
    fn encode(&self, _desired: &ResourceState, payload: Map<String, Value>) -> Result<Map<String, Value>> {
        Ok(payload)
    }

    /// Turn a read response into the object to flatten.
    ///
    /// Returning `None` means the resource is gone, which lets sub-resources
    /// living inside a container object report their absence.
    async fn decode(
        &self,
        _state: &ResourceState,
        response: Value,
        _cancel: &CancellationToken,
    ) -> Result<Option<Value>> {
        Ok(Some(response))
    }
}

/// A resource type that can be enumerated
pub trait ListableResource: ResourceKind {
    /// `{{field}}` template of the collection URL
    fn list_url(&self) -> &str;

    /// Key of the item array in a list page
    fn items_key(&self) -> &str {
        "items"
    }
}

/// Result of reading a resource
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Found(ResourceState),
    /// The resource no longer exists remotely
    Absent,
}

impl ReadOutcome {
    pub fn is_absent(&self) -> bool {
        matches!(self, ReadOutcome::Absent)
    }

    pub fn into_option(self) -> Option<ResourceState> {
        match self {
            ReadOutcome::Found(state) => Some(state),
            ReadOutcome::Absent => None,
        }
    }
}
