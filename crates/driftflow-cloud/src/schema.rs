//! Resource schemas and the schema-driven expand/flatten
//!
//! A [`ResourceSchema`] lists the fields of a resource in a fixed order. The
//! order drives payload construction and the update mask, so two runs over the
//! same states always produce the same requests.

use crate::config::ProviderConfig;
use crate::diff::{Equivalence, UpdateMask, is_empty_value};
use crate::error::{CloudError, Result};
use crate::names::resource_name_from_self_link;
use crate::state::ResourceState;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Who owns a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    Required,
    Optional,
    /// Set by the server only
    Computed,
    /// Set by the caller, or chosen by the server when omitted
    OptionalComputed,
}

/// Conversion between the wire representation of a field and its state value
pub trait FieldCodec: Send + Sync {
    /// Wire value to state value
    fn flatten(&self, raw: &Value) -> Result<Value>;

    /// State value to wire value
    fn expand(&self, value: &Value) -> Result<Value>;
}

/// Passes values through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl FieldCodec for IdentityCodec {
    fn flatten(&self, raw: &Value) -> Result<Value> {
        Ok(raw.clone())
    }

    fn expand(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }
}

/// int64 fields, which the API encodes as decimal strings
#[derive(Debug, Clone, Copy, Default)]
pub struct Fixed64Codec;

impl FieldCodec for Fixed64Codec {
    fn flatten(&self, raw: &Value) -> Result<Value> {
        match raw {
            Value::Null => Ok(Value::Null),
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| CloudError::Validation(format!("{:?} is not a 64-bit integer", s))),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(raw.clone()),
            // large values may come back as floats
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(Value::from(f as i64)),
                _ => Err(CloudError::Validation(format!("{} is not a 64-bit integer", n))),
            },
            other => Err(CloudError::Validation(format!(
                "{} is not a 64-bit integer",
                other
            ))),
        }
    }

    fn expand(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| CloudError::Validation(format!("{:?} is not a 64-bit integer", s))),
            other => Ok(other.clone()),
        }
    }
}

/// One field of a resource
#[derive(Clone)]
pub struct FieldSchema {
    /// Name in the resource state
    pub name: &'static str,

    /// Name on the wire
    pub api_name: &'static str,

    pub mode: FieldMode,

    /// A change cannot be applied in place
    pub force_new: bool,

    /// Normalized to its short name when read
    pub self_link: bool,

    /// Lives only in the URL and identity, never in request or response bodies
    pub url_param: bool,

    pub equivalence: Option<Arc<dyn Equivalence>>,
    pub codec: Option<Arc<dyn FieldCodec>>,
}

impl FieldSchema {
    fn new(name: &'static str, mode: FieldMode) -> Self {
        Self {
            name,
            api_name: name,
            mode,
            force_new: false,
            self_link: false,
            url_param: false,
            equivalence: None,
            codec: None,
        }
    }

    pub fn required(name: &'static str) -> Self {
        Self::new(name, FieldMode::Required)
    }

    pub fn optional(name: &'static str) -> Self {
        Self::new(name, FieldMode::Optional)
    }

    pub fn computed(name: &'static str) -> Self {
        Self::new(name, FieldMode::Computed)
    }

    pub fn optional_computed(name: &'static str) -> Self {
        Self::new(name, FieldMode::OptionalComputed)
    }

    pub fn api_name(mut self, api_name: &'static str) -> Self {
        self.api_name = api_name;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn self_link(mut self) -> Self {
        self.self_link = true;
        self
    }

    pub fn url_param(mut self) -> Self {
        self.url_param = true;
        self
    }

    pub fn equivalence(mut self, equivalence: impl Equivalence + 'static) -> Self {
        self.equivalence = Some(Arc::new(equivalence));
        self
    }

    pub fn codec(mut self, codec: impl FieldCodec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.mode, FieldMode::Computed | FieldMode::OptionalComputed)
    }

    /// Never set by the caller
    pub fn is_computed_only(&self) -> bool {
        self.mode == FieldMode::Computed
    }

    /// Can be changed with a partial update
    pub fn is_updatable(&self) -> bool {
        !self.is_computed_only() && !self.url_param && !self.force_new
    }

    fn flatten_value(&self, raw: &Value) -> Result<Value> {
        let value = match &self.codec {
            Some(codec) => codec.flatten(raw)?,
            None => raw.clone(),
        };
        Ok(self.normalize_value(value))
    }

    fn expand_value(&self, value: &Value) -> Result<Value> {
        match &self.codec {
            Some(codec) => codec.expand(value),
            None => Ok(value.clone()),
        }
    }

    fn normalize_value(&self, value: Value) -> Value {
        match value {
            Value::String(s) if self.self_link => {
                Value::String(resource_name_from_self_link(&s).to_string())
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for FieldSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSchema")
            .field("name", &self.name)
            .field("api_name", &self.api_name)
            .field("mode", &self.mode)
            .field("force_new", &self.force_new)
            .field("self_link", &self.self_link)
            .field("url_param", &self.url_param)
            .field("equivalence", &self.equivalence.is_some())
            .field("codec", &self.codec.is_some())
            .finish()
    }
}

/// Ordered field list of a resource type
#[derive(Debug, Clone, Default)]
pub struct ResourceSchema {
    fields: Vec<FieldSchema>,
}

impl ResourceSchema {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Request body for `state`, keyed by API name.
    ///
    /// Computed and URL-only fields are never sent, neither are zero values.
    /// With a mask, only masked fields are considered; a masked field that was
    /// cleared is left out of the body so the server clears it.
    pub fn expand_payload(
        &self,
        state: &ResourceState,
        mask: Option<&UpdateMask>,
    ) -> Result<Map<String, Value>> {
        let mut payload = Map::new();
        for field in &self.fields {
            if field.is_computed_only() || field.url_param {
                continue;
            }
            if mask.is_some_and(|m| !m.contains_field(field.name)) {
                continue;
            }
            let Some(value) = state.get_ok(field.name) else {
                continue;
            };
            payload.insert(field.api_name.to_string(), field.expand_value(value)?);
        }
        Ok(payload)
    }

    /// Build a fresh state from an API object.
    ///
    /// Every field the schema owns is overwritten: fields missing from the
    /// response become `null`. URL-only fields come from `carry` (the state
    /// the request was built from), then the response (listing), then the
    /// provider defaults.
    pub fn flatten(
        &self,
        response: &Value,
        carry: &ResourceState,
        config: &ProviderConfig,
    ) -> Result<ResourceState> {
        let mut state = ResourceState::new();
        for field in &self.fields {
            let raw = response.get(field.api_name).unwrap_or(&Value::Null);
            let value = match carry.get_ok(field.name) {
                Some(v) if field.url_param => field.normalize_value(v.clone()),
                _ if field.url_param && !is_empty_value(raw) => field.normalize_value(raw.clone()),
                _ if field.url_param => config
                    .default_var(field.name)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                _ => field
                    .flatten_value(raw)
                    .map_err(|e| CloudError::Validation(format!("{}: {}", field.name, e)))?,
            };
            state.set(field.name, value);
        }
        Ok(state)
    }

    /// Bring caller-supplied values into the form [`ResourceSchema::flatten`]
    /// produces, in place: self links become short names and codec fields
    /// take their read-back representation (`"100"` becomes `100`).
    ///
    /// A value the codec rejects is left untouched; building the payload
    /// reports it.
    pub fn normalize(&self, state: &mut ResourceState) {
        for field in &self.fields {
            let Some(value) = state.get(field.name) else {
                continue;
            };
            let value = match &field.codec {
                Some(codec) => match codec.expand(value).and_then(|wire| codec.flatten(&wire)) {
                    Ok(canonical) => canonical,
                    Err(_) => value.clone(),
                },
                None => value.clone(),
            };
            state.set(field.name, field.normalize_value(value));
        }
    }

    /// Fail when a required field is unset
    pub fn validate_required(&self, state: &ResourceState) -> Result<()> {
        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.mode == FieldMode::Required && state.get_ok(f.name).is_none())
            .map(|f| f.name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CloudError::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }
}
