//! Drift detection: zero values, field equivalence and update masks

use crate::names::{is_fixed64, resource_name_from_self_link};
use crate::schema::{FieldSchema, ResourceSchema};
use crate::state::ResourceState;
use serde_json::Value;

/// Whether `value` is the zero value of its type.
///
/// Zero values are never sent in create payloads, so omitted optional fields
/// stay omitted on the wire.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Per-field override of "is this a real change".
///
/// Returns `true` when `old` and `new` denote the same logical value even
/// though their raw representations differ.
pub trait Equivalence: Send + Sync {
    fn equivalent(&self, old: &Value, new: &Value) -> bool;
}

impl<F> Equivalence for F
where
    F: Fn(&Value, &Value) -> bool + Send + Sync,
{
    fn equivalent(&self, old: &Value, new: &Value) -> bool {
        self(old, new)
    }
}

/// Short name vs. self link (or two differently qualified links) of the same
/// resource
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceNameEquivalence;

impl Equivalence for ResourceNameEquivalence {
    fn equivalent(&self, old: &Value, new: &Value) -> bool {
        match (old.as_str(), new.as_str()) {
            (Some(old), Some(new)) => {
                resource_name_from_self_link(old) == resource_name_from_self_link(new)
            }
            _ => false,
        }
    }
}

/// A project referenced by id on one side and by number on the other.
///
/// Suppresses when the short names match, or when exactly one of the two is
/// numeric: the server normalized an id to a number, which is not a change.
/// Two different ids (or two different numbers) are a real change.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectNameOrNumber;

impl Equivalence for ProjectNameOrNumber {
    fn equivalent(&self, old: &Value, new: &Value) -> bool {
        let (Some(old), Some(new)) = (old.as_str(), new.as_str()) else {
            return false;
        };
        if old.is_empty() || new.is_empty() {
            return false;
        }

        let old_short = resource_name_from_self_link(old);
        let new_short = resource_name_from_self_link(new);
        if old_short == new_short {
            return true;
        }

        is_fixed64(old_short) != is_fixed64(new_short)
    }
}

/// Whether `field` differs between `old` and `new`, honouring its equivalence
pub fn has_change(field: &FieldSchema, old: &ResourceState, new: &ResourceState) -> bool {
    let old_value = old.get(field.name).unwrap_or(&Value::Null);
    let new_value = new.get(field.name).unwrap_or(&Value::Null);

    if old_value == new_value {
        return false;
    }
    // unset and zero are the same thing
    if is_empty_value(old_value) && is_empty_value(new_value) {
        return false;
    }
    match &field.equivalence {
        Some(eq) => !eq.equivalent(old_value, new_value),
        None => true,
    }
}

/// Ordered set of API field names a partial update may touch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateMask {
    fields: Vec<String>,
    api_fields: Vec<String>,
}

impl UpdateMask {
    /// Updatable fields whose desired value differs from the observed one,
    /// in schema order
    pub fn compute(schema: &ResourceSchema, observed: &ResourceState, desired: &ResourceState) -> Self {
        let mut mask = Self::default();
        for field in schema.fields().filter(|f| f.is_updatable()) {
            if keeps_server_value(field, desired) {
                continue;
            }
            if has_change(field, observed, desired) {
                mask.fields.push(field.name.to_string());
                mask.api_fields.push(field.api_name.to_string());
            }
        }
        mask
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema field `name` is part of the mask
    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// Schema field names
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Value of the `updateMask` query parameter
    pub fn to_query_value(&self) -> String {
        self.api_fields.join(",")
    }
}

// unset optional+computed fields keep whatever the server chose
fn keeps_server_value(field: &FieldSchema, desired: &ResourceState) -> bool {
    field.is_computed() && desired.get_ok(field.name).is_none()
}

/// `force_new` fields whose change cannot be applied in place
pub fn replacement_fields(
    schema: &ResourceSchema,
    observed: &ResourceState,
    desired: &ResourceState,
) -> Vec<String> {
    schema
        .fields()
        .filter(|f| f.force_new && !f.is_computed_only())
        .filter(|f| !keeps_server_value(f, desired))
        .filter(|f| has_change(f, observed, desired))
        .map(|f| f.name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Fixed64Codec, FieldSchema, ResourceSchema};
    use serde_json::json;

    fn quota_schema() -> ResourceSchema {
        ResourceSchema::new(vec![
            FieldSchema::required("name").force_new().url_param(),
            FieldSchema::required("disk_limit_mib")
                .api_name("diskLimitMib")
                .codec(Fixed64Codec),
            FieldSchema::optional("description"),
            FieldSchema::optional("target"),
            FieldSchema::computed("state"),
        ])
    }

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!(0)));
        assert!(is_empty_value(&json!(0.0)));
        assert!(is_empty_value(&json!(false)));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));
        assert!(!is_empty_value(&json!("x")));
        assert!(!is_empty_value(&json!(1)));
        assert!(!is_empty_value(&json!(true)));
    }

    #[test]
    fn test_project_name_or_number() {
        let eq = ProjectNameOrNumber;
        // same short name
        assert!(eq.equivalent(
            &json!("locations/global/metricsScopes/1/projects/my-proj"),
            &json!("my-proj")
        ));
        // id vs number: normalization, not a change
        assert!(eq.equivalent(&json!("1234567"), &json!("my-proj")));
        assert!(eq.equivalent(
            &json!("my-proj"),
            &json!("locations/global/metricsScopes/1/projects/1234567")
        ));
        // two different ids or two different numbers are real changes
        assert!(!eq.equivalent(&json!("proj-a"), &json!("proj-b")));
        assert!(!eq.equivalent(&json!("111"), &json!("222")));
        // empty never suppresses
        assert!(!eq.equivalent(&json!(""), &json!("proj-a")));
    }

    #[test]
    fn test_resource_name_equivalence() {
        let eq = ResourceNameEquivalence;
        assert!(eq.equivalent(
            &json!("https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a"),
            &json!("us-central1-a")
        ));
        assert!(!eq.equivalent(&json!("zones/us-central1-a"), &json!("us-central1-b")));
        assert!(!eq.equivalent(&json!(1), &json!(1.0)));
    }

    #[test]
    fn test_closure_equivalence() {
        let case_insensitive = |old: &Value, new: &Value| match (old.as_str(), new.as_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        };
        let field = FieldSchema::optional("type").equivalence(case_insensitive);
        let old = ResourceState::new().with_attribute("type", "DEFAULT_USER_QUOTA");
        let new = ResourceState::new().with_attribute("type", "default_user_quota");
        assert!(!has_change(&field, &old, &new));
    }

    #[test]
    fn test_update_mask_in_schema_order() {
        let schema = quota_schema();
        let observed = ResourceState::new()
            .with_attribute("name", "q")
            .with_attribute("disk_limit_mib", 100)
            .with_attribute("description", "old")
            .with_attribute("state", "READY");
        let desired = ResourceState::new()
            .with_attribute("name", "q")
            .with_attribute("disk_limit_mib", 200)
            .with_attribute("description", "new")
            .with_attribute("target", "");

        let mask = UpdateMask::compute(&schema, &observed, &desired);
        assert_eq!(mask.fields(), &["disk_limit_mib", "description"]);
        assert_eq!(mask.to_query_value(), "diskLimitMib,description");
        assert!(mask.contains_field("description"));
        assert!(!mask.contains_field("state"));
    }

    #[test]
    fn test_update_mask_empty_when_identical() {
        let schema = quota_schema();
        let state = ResourceState::new()
            .with_attribute("name", "q")
            .with_attribute("disk_limit_mib", 100);
        assert!(UpdateMask::compute(&schema, &state, &state.clone()).is_empty());
    }

    #[test]
    fn test_update_mask_keeps_server_chosen_value() {
        let schema = ResourceSchema::new(vec![
            FieldSchema::required("name").url_param(),
            FieldSchema::optional("description"),
            FieldSchema::optional_computed("tier"),
        ]);
        let observed = ResourceState::new()
            .with_attribute("name", "q")
            .with_attribute("description", "d")
            .with_attribute("tier", "GOLD");

        let unset = ResourceState::new()
            .with_attribute("name", "q")
            .with_attribute("description", "d");
        assert!(UpdateMask::compute(&schema, &observed, &unset).is_empty());

        let changed = unset.clone().with_attribute("tier", "SILVER");
        let mask = UpdateMask::compute(&schema, &observed, &changed);
        assert_eq!(mask.to_query_value(), "tier");
    }

    #[test]
    fn test_replacement_fields() {
        let schema = quota_schema();
        let observed = ResourceState::new().with_attribute("name", "q1");
        let desired = ResourceState::new().with_attribute("name", "q2");
        assert_eq!(replacement_fields(&schema, &observed, &desired), vec!["name"]);
        assert!(replacement_fields(&schema, &observed, &observed).is_empty());
    }
}
