//! Planned changes for managed resources

use crate::diff::{UpdateMask, replacement_fields};
use crate::resource::ResourceDefinition;
use crate::state::ResourceState;
use serde::{Deserialize, Serialize};

/// Represents a planned action for a cloud resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type (e.g., "netapp_volume_quota_rule")
    pub resource_type: String,

    /// Identity, or the display name for resources not created yet
    pub resource_id: String,

    /// Description of the action
    pub description: String,

    /// Fields driving the action: the update mask for `Update`, the fields
    /// forcing a new resource for `Replace`
    pub fields: Vec<String>,
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Delete and create again
    Replace,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Decide what it takes to move `current` to `desired`.
///
/// `None` for `desired` means the resource should not exist, `None` for
/// `current` means it does not exist yet.
pub fn plan_action(
    def: &dyn ResourceDefinition,
    desired: Option<&ResourceState>,
    current: Option<&ResourceState>,
) -> Action {
    let schema = def.schema();
    let resource_id = current
        .and_then(|c| c.id())
        .map(|id| id.to_string())
        .or_else(|| desired.and_then(|d| d.get_str("name")).map(str::to_string))
        .unwrap_or_default();

    let (action_type, fields) = match (desired, current) {
        (None, None) => (ActionType::NoOp, Vec::new()),
        (None, Some(_)) => (ActionType::Delete, Vec::new()),
        (Some(_), None) => (ActionType::Create, Vec::new()),
        (Some(desired), Some(current)) => {
            let mut desired = desired.clone();
            schema.normalize(&mut desired);

            let replace = replacement_fields(schema, current, &desired);
            let mask = UpdateMask::compute(schema, current, &desired);
            if !replace.is_empty() {
                (ActionType::Replace, replace)
            } else if mask.is_empty() {
                (ActionType::NoOp, Vec::new())
            } else if def.supports_update() {
                (ActionType::Update, mask.fields().to_vec())
            } else {
                (ActionType::Replace, mask.fields().to_vec())
            }
        }
    };

    let description = match action_type {
        ActionType::Update | ActionType::Replace => format!(
            "{} {} ({})",
            action_type,
            def.resource_type(),
            fields.join(", ")
        ),
        _ => format!("{} {}", action_type, def.resource_type()),
    };

    Action {
        action_type,
        resource_type: def.resource_type().to_string(),
        resource_id,
        description,
        fields,
    }
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(move |a| a.action_type == action_type)
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        let count = |t| self.actions_by_type(t).count();
        PlanSummary {
            create: count(ActionType::Create),
            update: count(ActionType::Update),
            replace: count(ActionType::Replace),
            delete: count(ActionType::Delete),
            no_change: count(ActionType::NoOp),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;
    use crate::schema::{FieldSchema, ResourceSchema};

    struct Bucket {
        schema: ResourceSchema,
        updatable: bool,
    }

    impl Bucket {
        fn new(updatable: bool) -> Self {
            Self {
                schema: ResourceSchema::new(vec![
                    FieldSchema::required("name").force_new().url_param(),
                    FieldSchema::optional("location").force_new(),
                    FieldSchema::optional("storage_class").api_name("storageClass"),
                ]),
                updatable,
            }
        }
    }

    impl ResourceKind for Bucket {
        fn resource_type(&self) -> &str {
            "storage_bucket"
        }

        fn schema(&self) -> &ResourceSchema {
            &self.schema
        }

        fn id_template(&self) -> &str {
            "b/{{name}}"
        }
    }

    impl ResourceDefinition for Bucket {
        fn base_path_key(&self) -> &str {
            "StorageBasePath"
        }

        fn create_url(&self) -> &str {
            "{{StorageBasePath}}b"
        }

        fn read_url(&self) -> &str {
            "{{StorageBasePath}}b/{{name}}"
        }

        fn supports_update(&self) -> bool {
            self.updatable
        }
    }

    fn bucket(location: &str, class: &str) -> ResourceState {
        ResourceState::new()
            .with_attribute("name", "logs")
            .with_attribute("location", location)
            .with_attribute("storage_class", class)
    }

    #[test]
    fn test_plan_action_types() {
        let def = Bucket::new(true);
        let current = bucket("US", "STANDARD");

        assert_eq!(
            plan_action(&def, Some(&current), None).action_type,
            ActionType::Create
        );
        assert_eq!(
            plan_action(&def, None, Some(&current)).action_type,
            ActionType::Delete
        );
        assert_eq!(
            plan_action(&def, Some(&current), Some(&current)).action_type,
            ActionType::NoOp
        );

        let update = plan_action(&def, Some(&bucket("US", "NEARLINE")), Some(&current));
        assert_eq!(update.action_type, ActionType::Update);
        assert_eq!(update.fields, vec!["storage_class"]);
        assert_eq!(update.description, "update storage_bucket (storage_class)");

        let replace = plan_action(&def, Some(&bucket("EU", "NEARLINE")), Some(&current));
        assert_eq!(replace.action_type, ActionType::Replace);
        assert_eq!(replace.fields, vec!["location"]);
    }

    #[test]
    fn test_non_updatable_type_is_replaced() {
        let def = Bucket::new(false);
        let action = plan_action(
            &def,
            Some(&bucket("US", "NEARLINE")),
            Some(&bucket("US", "STANDARD")),
        );
        assert_eq!(action.action_type, ActionType::Replace);
    }

    #[test]
    fn test_plan_summary() {
        let def = Bucket::new(true);
        let current = bucket("US", "STANDARD");
        let plan = Plan::new(vec![
            plan_action(&def, Some(&current), None),
            plan_action(&def, Some(&current), Some(&current)),
            plan_action(&def, Some(&bucket("EU", "STANDARD")), Some(&current)),
        ]);

        assert!(plan.has_changes);
        let summary = plan.summary();
        assert_eq!(summary.create, 1);
        assert_eq!(summary.replace, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(
            summary.to_string(),
            "1 to create, 0 to update, 1 to replace, 0 to delete, 1 unchanged"
        );
        assert!(!Plan::empty().has_changes);
    }
}
