//! Resource state model
//!
//! A [`ResourceState`] is a flat mapping from schema field name to a JSON
//! value. The same type carries the caller's desired configuration and the
//! state decoded from the remote API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Stable key addressing one remote resource instance
/// (e.g. `projects/p/locations/l/volumes/v/quotaRules/q`).
///
/// Only built by the engine: from desired fields at create time, or while
/// importing an existing resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// State of a single resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Identity, once the resource has been created or imported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<ResourceIdentity>,

    /// Field values keyed by schema field name
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
}

/// Caller-declared target configuration
pub type DesiredState = ResourceState;

/// State decoded from the remote API
pub type ObservedState = ResourceState;

impl ResourceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Value of `key` when it is set to something other than its zero value
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.attributes
            .get(key)
            .filter(|v| !crate::diff::is_empty_value(v))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Get an attribute as a specific type
    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn id(&self) -> Option<&ResourceIdentity> {
        self.id.as_ref()
    }

    pub(crate) fn set_id(&mut self, id: ResourceIdentity) {
        self.id = Some(id);
    }

    /// Forget the identity (the resource is treated as never created)
    pub fn clear_id(&mut self) {
        self.id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_ok_skips_zero_values() {
        let state = ResourceState::new()
            .with_attribute("name", "quota-1")
            .with_attribute("description", "")
            .with_attribute("disk_limit_mib", 0)
            .with_attribute("labels", json!({}));

        assert_eq!(state.get_ok("name"), Some(&json!("quota-1")));
        assert!(state.get_ok("description").is_none());
        assert!(state.get_ok("disk_limit_mib").is_none());
        assert!(state.get_ok("labels").is_none());
        assert!(state.get_ok("missing").is_none());
        assert!(state.get("description").is_some());
    }

    #[test]
    fn test_identity_round_trips_through_serde() {
        let mut state = ResourceState::new().with_attribute("name", "a");
        state.set_id(ResourceIdentity::new("projects/p/things/a"));

        let encoded = serde_json::to_value(&state).unwrap();
        assert_eq!(encoded["id"], json!("projects/p/things/a"));

        let decoded: ResourceState = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.id().unwrap().as_str(), "projects/p/things/a");
    }

    #[test]
    fn test_get_attribute_typed() {
        let state = ResourceState::new().with_attribute("disk_limit_mib", 4096);
        assert_eq!(state.get_attribute::<u64>("disk_limit_mib"), Some(4096));
        assert_eq!(state.get_attribute::<String>("disk_limit_mib"), None);
    }
}
