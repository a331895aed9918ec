//! Create / read / update / delete against operation-based APIs

use crate::config::ProviderConfig;
use crate::diff::{UpdateMask, replacement_fields};
use crate::error::{CloudError, Result};
use crate::list::Lister;
use crate::operation::{OperationHandle, OperationWaiter};
use crate::plan::{Action, ActionType, plan_action};
use crate::resource::{ReadOutcome, ResourceDefinition};
use crate::state::{ResourceIdentity, ResourceState};
use crate::template::{parse_import_id, replace_vars};
use crate::transport::{ApiRequest, Method, Transport, add_query_params, send_cancellable};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives resource lifecycles through a [`Transport`]
pub struct Reconciler<T> {
    transport: T,
    config: ProviderConfig,
    waiter: OperationWaiter,
}

impl<T: Transport> Reconciler<T> {
    pub fn new(transport: T, config: ProviderConfig) -> Self {
        let waiter = OperationWaiter::new(config.poll.clone());
        Self {
            transport,
            config,
            waiter,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Lister sharing this reconciler's transport and configuration
    pub fn lister(&self) -> Lister<'_> {
        Lister::new(&self.transport, &self.config)
    }

    /// Create the resource described by `desired` and return its observed
    /// state.
    ///
    /// The identity is built from the desired fields. When the creation
    /// operation fails, times out or is cancelled the identity is dropped and
    /// the error returned; a resource that cannot be read back afterwards is
    /// reported as [`CloudError::Inconsistent`].
    #[tracing::instrument(skip_all, fields(resource = def.resource_type()))]
    pub async fn create(
        &self,
        def: &dyn ResourceDefinition,
        desired: &ResourceState,
        cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let schema = def.schema();
        let mut desired = desired.clone();
        schema.normalize(&mut desired);
        schema.validate_required(&desired)?;

        let payload = def.encode(&desired, schema.expand_payload(&desired, None)?)?;
        let url = replace_vars(&desired, &self.config, def.create_url())?;
        let id = ResourceIdentity::new(replace_vars(&desired, &self.config, def.id_template())?);

        info!(id = %id, "Creating new {}", def.resource_type());
        let body = Value::Object(payload);
        debug!(url = %url, body = %body, "create request");

        let timeout = self.config.timeouts.create();
        let started = Instant::now();
        let request = ApiRequest::new(Method::Post, url)
            .with_body(body)
            .with_timeout(timeout)
            .with_retry_predicates(def.retry_predicates());
        let response = send_cancellable(&self.transport, request, cancel).await?;

        if def.is_async() {
            let activity = format!("Creating {}", def.resource_type());
            if let Err(e) = self
                .wait(def, response, &activity, remaining(timeout, started), cancel)
                .await
            {
                warn!(id = %id, error = %e, "create did not complete, discarding identity");
                return Err(e);
            }
        }

        desired.set_id(id.clone());
        match self.read(def, &desired, cancel).await? {
            ReadOutcome::Found(state) => {
                info!(id = %id, "Finished creating {}", def.resource_type());
                Ok(state)
            }
            ReadOutcome::Absent => Err(CloudError::Inconsistent(format!(
                "{} {} was created but cannot be read back",
                def.resource_type(),
                id
            ))),
        }
    }

    /// Read the remote state of `state`.
    ///
    /// A resource that no longer exists is [`ReadOutcome::Absent`], never an
    /// error.
    #[tracing::instrument(skip_all, fields(resource = def.resource_type()))]
    pub async fn read(
        &self,
        def: &dyn ResourceDefinition,
        state: &ResourceState,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome> {
        let schema = def.schema();
        let mut input = state.clone();
        schema.normalize(&mut input);

        let url = replace_vars(&input, &self.config, def.read_url())?;
        debug!(url = %url, "read request");

        let request = ApiRequest::get(url).with_retry_predicates(def.retry_predicates());
        let response = match send_cancellable(&self.transport, request, cancel).await {
            Ok(response) => response.unwrap_or_else(|| Value::Object(Default::default())),
            Err(e) if e.is_not_found() => {
                warn!(id = ?input.id(), "Removing {} because it no longer exists", def.resource_type());
                return Ok(ReadOutcome::Absent);
            }
            Err(e) => return Err(e),
        };

        let Some(object) = def.decode(&input, response, cancel).await? else {
            warn!(id = ?input.id(), "Removing {} because it no longer exists", def.resource_type());
            return Ok(ReadOutcome::Absent);
        };

        let mut observed = schema.flatten(&object, &input, &self.config)?;
        match input.id() {
            Some(id) => observed.set_id(id.clone()),
            None => {
                let id = replace_vars(&observed, &self.config, def.id_template())?;
                observed.set_id(ResourceIdentity::new(id));
            }
        }
        Ok(ReadOutcome::Found(observed))
    }

    /// Apply the updatable differences between `observed` and `desired`.
    ///
    /// Nothing is sent when no field changed. A changed `force_new` field is
    /// [`CloudError::RequiresReplacement`].
    #[tracing::instrument(skip_all, fields(resource = def.resource_type()))]
    pub async fn update(
        &self,
        def: &dyn ResourceDefinition,
        desired: &ResourceState,
        observed: &ResourceState,
        cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let schema = def.schema();
        let mut desired = desired.clone();
        schema.normalize(&mut desired);

        let replace = replacement_fields(schema, observed, &desired);
        if !replace.is_empty() {
            return Err(CloudError::RequiresReplacement(replace));
        }

        let mask = UpdateMask::compute(schema, observed, &desired);
        if mask.is_empty() {
            debug!("no changes to apply");
            return Ok(observed.clone());
        }
        if !def.supports_update() {
            return Err(CloudError::RequiresReplacement(mask.fields().to_vec()));
        }

        let payload = def.encode(&desired, schema.expand_payload(&desired, Some(&mask))?)?;
        let url = replace_vars(observed, &self.config, def.update_url())?;
        let mut params = BTreeMap::new();
        params.insert("updateMask".to_string(), mask.to_query_value());
        let url = add_query_params(&url, &params)?;

        info!(id = ?observed.id(), mask = %mask.to_query_value(), "Updating {}", def.resource_type());
        let body = Value::Object(payload);
        debug!(url = %url, body = %body, "update request");

        let timeout = self.config.timeouts.update();
        let started = Instant::now();
        let request = ApiRequest::new(Method::Patch, url)
            .with_body(body)
            .with_timeout(timeout)
            .with_retry_predicates(def.retry_predicates());
        let response = send_cancellable(&self.transport, request, cancel).await?;

        if def.is_async() {
            let activity = format!("Updating {}", def.resource_type());
            self.wait(def, response, &activity, remaining(timeout, started), cancel)
                .await?;
        }

        match self.read(def, observed, cancel).await? {
            ReadOutcome::Found(state) => Ok(state),
            ReadOutcome::Absent => Err(CloudError::Inconsistent(format!(
                "{} disappeared while being updated",
                def.resource_type()
            ))),
        }
    }

    /// Delete the resource. One that is already gone counts as deleted.
    #[tracing::instrument(skip_all, fields(resource = def.resource_type()))]
    pub async fn delete(
        &self,
        def: &dyn ResourceDefinition,
        state: &ResourceState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut input = state.clone();
        def.schema().normalize(&mut input);
        let url = replace_vars(&input, &self.config, def.delete_url())?;

        info!(id = ?input.id(), "Deleting {}", def.resource_type());

        let timeout = self.config.timeouts.delete();
        let started = Instant::now();
        let request = ApiRequest::new(Method::Delete, url)
            .with_timeout(timeout)
            .with_retry_predicates(def.retry_predicates());
        let response = match send_cancellable(&self.transport, request, cancel).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                warn!(id = ?input.id(), "{} already deleted", def.resource_type());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if def.is_async() && response.is_some() {
            let activity = format!("Deleting {}", def.resource_type());
            self.wait(def, response, &activity, remaining(timeout, started), cancel)
                .await?;
        }

        info!(id = ?input.id(), "Finished deleting {}", def.resource_type());
        Ok(())
    }

    /// State for an existing resource addressed by an import id.
    ///
    /// Only parses the id; read the returned state to fill in the rest.
    pub fn import(&self, def: &dyn ResourceDefinition, import_id: &str) -> Result<ResourceState> {
        let mut state = ResourceState::new();
        parse_import_id(def.import_formats(), import_id, &mut state, &self.config)?;
        def.schema().normalize(&mut state);

        let id = replace_vars(&state, &self.config, def.id_template())
            .map_err(|e| CloudError::Validation(format!("Error constructing id: {}", e)))?;
        state.set_id(ResourceIdentity::new(id));
        Ok(state)
    }

    pub fn plan(
        &self,
        def: &dyn ResourceDefinition,
        desired: Option<&ResourceState>,
        current: Option<&ResourceState>,
    ) -> Action {
        plan_action(def, desired, current)
    }

    /// Carry out a planned action. Returns the resulting state, or `None`
    /// when the resource no longer exists.
    pub async fn apply(
        &self,
        def: &dyn ResourceDefinition,
        action: &Action,
        desired: Option<&ResourceState>,
        current: Option<&ResourceState>,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceState>> {
        let missing = |what: &str| {
            CloudError::Validation(format!("{} action needs a {} state", action.action_type, what))
        };

        match action.action_type {
            ActionType::NoOp => Ok(current.cloned()),
            ActionType::Create => {
                let desired = desired.ok_or_else(|| missing("desired"))?;
                self.create(def, desired, cancel).await.map(Some)
            }
            ActionType::Update => {
                let desired = desired.ok_or_else(|| missing("desired"))?;
                let current = current.ok_or_else(|| missing("current"))?;
                self.update(def, desired, current, cancel).await.map(Some)
            }
            ActionType::Replace => {
                let desired = desired.ok_or_else(|| missing("desired"))?;
                let current = current.ok_or_else(|| missing("current"))?;
                self.delete(def, current, cancel).await?;
                self.create(def, desired, cancel).await.map(Some)
            }
            ActionType::Delete => {
                let current = current.ok_or_else(|| missing("current"))?;
                self.delete(def, current, cancel).await?;
                Ok(None)
            }
        }
    }

    /// Plan and apply in one step
    pub async fn reconcile(
        &self,
        def: &dyn ResourceDefinition,
        desired: Option<&ResourceState>,
        current: Option<&ResourceState>,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceState>> {
        let action = self.plan(def, desired, current);
        info!(action = %action.action_type, resource = %action.resource_id, "{}", action.description);
        self.apply(def, &action, desired, current, cancel).await
    }

    async fn wait(
        &self,
        def: &dyn ResourceDefinition,
        response: Option<Value>,
        activity: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>> {
        let response = response.ok_or_else(|| {
            CloudError::Inconsistent(format!("{}: no operation in the response", activity))
        })?;
        let handle = OperationHandle::from_response(&response)?;
        let base = def.operation_base_url(&self.config)?;
        self.waiter
            .wait(&self.transport, &base, handle, activity, timeout, cancel)
            .await
    }
}

fn remaining(timeout: Duration, started: Instant) -> Duration {
    timeout.saturating_sub(started.elapsed())
}
