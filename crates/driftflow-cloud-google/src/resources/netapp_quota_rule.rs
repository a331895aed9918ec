//! NetApp volume quota rule

use driftflow_cloud::{
    FieldSchema, Fixed64Codec, ListableResource, ResourceDefinition, ResourceKind, ResourceSchema,
};

const RULE_PATH: &str =
    "projects/{{project}}/locations/{{location}}/volumes/{{volume_name}}/quotaRules/{{name}}";

/// `netapp_volume_quota_rule`: a user or group quota on a NetApp volume
pub struct VolumeQuotaRule {
    schema: ResourceSchema,
}

impl VolumeQuotaRule {
    pub fn new() -> Self {
        Self {
            schema: ResourceSchema::new(vec![
                FieldSchema::required("name")
                    .force_new()
                    .url_param()
                    .self_link(),
                FieldSchema::required("volume_name").force_new().url_param(),
                FieldSchema::optional("location").force_new().url_param(),
                FieldSchema::optional_computed("project").force_new().url_param(),
                FieldSchema::required("type"),
                FieldSchema::required("disk_limit_mib")
                    .api_name("diskLimitMib")
                    .codec(Fixed64Codec),
                FieldSchema::optional("target"),
                FieldSchema::optional("description"),
                FieldSchema::optional("labels"),
                FieldSchema::computed("state"),
                FieldSchema::computed("state_details").api_name("stateDetails"),
                FieldSchema::computed("create_time").api_name("createTime"),
            ]),
        }
    }
}

impl Default for VolumeQuotaRule {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for VolumeQuotaRule {
    fn resource_type(&self) -> &str {
        "netapp_volume_quota_rule"
    }

    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    fn id_template(&self) -> &str {
        RULE_PATH
    }
}

impl ResourceDefinition for VolumeQuotaRule {
    fn base_path_key(&self) -> &str {
        "NetappBasePath"
    }

    fn create_url(&self) -> &str {
        "{{NetappBasePath}}projects/{{project}}/locations/{{location}}/volumes/{{volume_name}}/quotaRules?quotaRuleId={{name}}"
    }

    fn read_url(&self) -> &str {
        "{{NetappBasePath}}projects/{{project}}/locations/{{location}}/volumes/{{volume_name}}/quotaRules/{{name}}"
    }

    fn import_formats(&self) -> &[&'static str] {
        &[
            RULE_PATH,
            "{{project}}/{{location}}/{{volume_name}}/{{name}}",
            "{{location}}/{{volume_name}}/{{name}}",
        ]
    }
}

impl ListableResource for VolumeQuotaRule {
    fn list_url(&self) -> &str {
        "{{NetappBasePath}}projects/{{project}}/locations/{{location}}/volumes/{{volume_name}}/quotaRules"
    }

    fn items_key(&self) -> &str {
        "quotaRules"
    }
}
