//! Enumeration of existing remote resources
//!
//! [`Lister::list`] walks every page of a collection, turns each raw item into
//! a [`ListResult`] and pushes it to a [`ResultSink`]. A failure preparing one
//! item becomes a diagnostic result and the stream goes on; a failed page
//! request ends the traversal with an error.

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::filter::ListFilter;
use crate::paginate::{ListRequest, Paginator};
use crate::resource::ListableResource;
use crate::sink::{Diagnostic, ListResult, ResultSink};
use crate::state::{ResourceIdentity, ResourceState};
use crate::template::replace_vars;
use crate::transport::Transport;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Counters of one traversal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSummary {
    pub pages: usize,

    /// Results the sink accepted. The one that made it stop is not counted:
    /// a closed channel never received it.
    pub pushed: usize,

    /// Accepted results that carried an error diagnostic
    pub diagnostics: usize,

    /// The sink asked to stop before the last page
    pub stopped_early: bool,
}

/// Lists resources of a [`ListableResource`] type
pub struct Lister<'a> {
    transport: &'a dyn Transport,
    config: &'a ProviderConfig,
}

impl<'a> Lister<'a> {
    pub fn new(transport: &'a dyn Transport, config: &'a ProviderConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ProviderConfig {
        self.config
    }

    /// Stream every resource in `scope` (the fields the collection URL needs,
    /// e.g. project and zone) to `sink`.
    ///
    /// When `include_resource` is false only the display name and identity
    /// are sent.
    #[tracing::instrument(skip_all, fields(resource = def.resource_type()))]
    pub async fn list(
        &self,
        def: &dyn ListableResource,
        scope: &ResourceState,
        filter: Option<&ListFilter>,
        include_resource: bool,
        sink: &mut dyn ResultSink,
        cancel: &CancellationToken,
    ) -> Result<ListSummary> {
        let mut paginator = Paginator::new(self.transport, self.request(def, scope, filter)?);
        let mut summary = ListSummary::default();

        while let Some(page) = paginator.next_page(cancel).await? {
            summary.pages = page.number;
            debug!(page = page.number, items = page.items.len(), "page received");

            for item in &page.items {
                let result = self.prepare(def, scope, item, include_resource);
                let has_errors = result.has_errors();

                if !sink.push(result).await {
                    info!(pushed = summary.pushed, "result stream closed by consumer");
                    summary.stopped_early = true;
                    return Ok(summary);
                }
                summary.pushed += 1;
                if has_errors {
                    summary.diagnostics += 1;
                }
            }
        }

        info!(pages = summary.pages, pushed = summary.pushed, "listing finished");
        Ok(summary)
    }

    /// Every resource in `scope` as a state with identity, for plural data
    /// sources. Unlike [`Lister::list`], an item that cannot be flattened
    /// fails the whole call.
    pub async fn collect(
        &self,
        def: &dyn ListableResource,
        scope: &ResourceState,
        filter: Option<&ListFilter>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResourceState>> {
        let mut paginator = Paginator::new(self.transport, self.request(def, scope, filter)?);
        let mut states = Vec::new();
        while let Some(page) = paginator.next_page(cancel).await? {
            for item in &page.items {
                states.push(self.to_state(def, scope, item)?);
            }
        }
        Ok(states)
    }

    fn request(
        &self,
        def: &dyn ListableResource,
        scope: &ResourceState,
        filter: Option<&ListFilter>,
    ) -> Result<ListRequest> {
        let url = replace_vars(scope, self.config, def.list_url())?;
        Ok(ListRequest::new(url)
            .with_filter(filter)
            .with_items_key(def.items_key())
            .with_retry_predicates(def.retry_predicates()))
    }

    fn prepare(
        &self,
        def: &dyn ListableResource,
        scope: &ResourceState,
        item: &Value,
        include_resource: bool,
    ) -> ListResult {
        let display_name = def.display_name(item);
        match self.to_state(def, scope, item) {
            Ok(state) => ListResult {
                display_name,
                identity: state.id().cloned(),
                resource: include_resource.then_some(state),
                diagnostics: Vec::new(),
            },
            Err(e) => ListResult::diagnostic(
                display_name,
                Diagnostic::error(
                    format!("Error preparing {} result", def.resource_type()),
                    e.to_string(),
                ),
            ),
        }
    }

    // a fresh state per item, nothing carries over between items
    fn to_state(
        &self,
        def: &dyn ListableResource,
        scope: &ResourceState,
        item: &Value,
    ) -> Result<ResourceState> {
        let mut state = def.schema().flatten(item, scope, self.config)?;
        let id = replace_vars(&state, self.config, def.id_template())?;
        state.set_id(ResourceIdentity::new(id));
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, CloudError};
    use crate::mock::{MockTransport, Reply};
    use crate::resource::ResourceKind;
    use crate::schema::{FieldSchema, Fixed64Codec, ResourceSchema};
    use crate::sink::{CallbackSink, VecSink, channel};
    use crate::transport::Method;
    use serde_json::json;

    struct Disks {
        schema: ResourceSchema,
    }

    impl Disks {
        fn new() -> Self {
            Self {
                schema: ResourceSchema::new(vec![
                    FieldSchema::optional_computed("project").url_param(),
                    FieldSchema::required("zone").url_param(),
                    FieldSchema::required("name"),
                    FieldSchema::optional("size_gb").api_name("sizeGb").codec(Fixed64Codec),
                    FieldSchema::computed("status"),
                ]),
            }
        }
    }

    impl ResourceKind for Disks {
        fn resource_type(&self) -> &str {
            "compute_disk"
        }

        fn schema(&self) -> &ResourceSchema {
            &self.schema
        }

        fn id_template(&self) -> &str {
            "projects/{{project}}/zones/{{zone}}/disks/{{name}}"
        }
    }

    impl ListableResource for Disks {
        fn list_url(&self) -> &str {
            "{{ComputeBasePath}}projects/{{project}}/zones/{{zone}}/disks"
        }
    }

    fn config() -> ProviderConfig {
        ProviderConfig::new()
            .with_project("p")
            .with_base_path("ComputeBasePath", "https://compute.test/v1/")
    }

    fn scope() -> ResourceState {
        ResourceState::new().with_attribute("zone", "us-central1-a")
    }

    #[tokio::test]
    async fn test_list_streams_every_item() {
        let transport = MockTransport::new();
        transport.expect_get(
            "projects/p/zones/us-central1-a/disks",
            json!({"items": [{"name": "d1", "sizeGb": "10"}], "nextPageToken": "t"}),
        );
        transport.expect_get("pageToken=t", json!({"items": [{"name": "d2", "sizeGb": "20"}]}));

        let config = config();
        let mut sink = VecSink::default();
        let summary = Lister::new(&transport, &config)
            .list(&Disks::new(), &scope(), None, true, &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.pushed, 2);
        assert!(!summary.stopped_early);

        let first = &sink.results[0];
        assert_eq!(first.display_name, "d1");
        assert_eq!(
            first.identity.as_ref().unwrap().as_str(),
            "projects/p/zones/us-central1-a/disks/d1"
        );
        let resource = first.resource.as_ref().unwrap();
        assert_eq!(resource.get("size_gb"), Some(&json!(10)));
        assert_eq!(resource.get_str("zone"), Some("us-central1-a"));
    }

    #[tokio::test]
    async fn test_items_do_not_leak_into_each_other() {
        let transport = MockTransport::new();
        transport.expect_get(
            "disks",
            json!({"items": [{"name": "d1", "sizeGb": "10", "status": "READY"}, {"name": "d2"}]}),
        );

        let config = config();
        let mut sink = VecSink::default();
        Lister::new(&transport, &config)
            .list(&Disks::new(), &scope(), None, true, &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        let second = sink.results[1].resource.as_ref().unwrap();
        assert_eq!(second.get("size_gb"), Some(&Value::Null));
        assert_eq!(second.get("status"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_stop_after_first_push_fetches_no_more_pages() {
        let transport = MockTransport::new();
        transport.expect_get(
            "disks",
            json!({"items": [{"name": "d1"}, {"name": "d2"}], "nextPageToken": "t"}),
        );

        let config = config();
        let mut seen = Vec::new();
        let mut sink = CallbackSink::new(|r: ListResult| {
            seen.push(r.display_name);
            false
        });
        let summary = Lister::new(&transport, &config)
            .list(&Disks::new(), &scope(), None, false, &mut sink, &CancellationToken::new())
            .await
            .unwrap();
        drop(sink);

        assert!(summary.stopped_early);
        assert_eq!(seen, vec!["d1"]);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_on_last_item_of_page_skips_next_page() {
        let transport = MockTransport::new();
        transport.expect_get(
            "disks",
            json!({"items": [{"name": "d1"}, {"name": "d2"}], "nextPageToken": "t"}),
        );

        let config = config();
        let mut seen = Vec::new();
        let mut sink = CallbackSink::new(|r: ListResult| {
            seen.push(r.display_name);
            seen.len() < 2
        });
        let summary = Lister::new(&transport, &config)
            .list(&Disks::new(), &scope(), None, false, &mut sink, &CancellationToken::new())
            .await
            .unwrap();
        drop(sink);

        assert!(summary.stopped_early);
        assert_eq!(summary.pages, 1);
        assert_eq!(summary.pushed, 1);
        assert_eq!(seen, vec!["d1", "d2"]);
        assert_eq!(transport.requests().len(), 1);
        transport.assert_done();
    }

    #[tokio::test]
    async fn test_three_pages_in_order() {
        let transport = MockTransport::new();
        transport.expect_get(
            "disks",
            json!({"items": [{"name": "d1"}, {"name": "d2"}], "nextPageToken": "t1"}),
        );
        transport.expect_get("pageToken=t1", json!({"items": [{"name": "d3"}], "nextPageToken": "t2"}));
        transport.expect_get("pageToken=t2", json!({"items": [{"name": "d4"}], "nextPageToken": ""}));

        let config = config();
        let mut sink = VecSink::default();
        let summary = Lister::new(&transport, &config)
            .list(&Disks::new(), &scope(), None, false, &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.pages, 3);
        assert_eq!(summary.pushed, 4);
        let names: Vec<&str> = sink.results.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["d1", "d2", "d3", "d4"]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert!(!requests[0].url.contains("pageToken"));
        transport.assert_done();
    }

    #[tokio::test]
    async fn test_item_error_becomes_diagnostic() {
        let transport = MockTransport::new();
        transport.expect_get(
            "disks",
            json!({"items": [{"name": "d1", "sizeGb": "huge"}, {"name": "d2", "sizeGb": "5"}]}),
        );

        let config = config();
        let mut sink = VecSink::default();
        let summary = Lister::new(&transport, &config)
            .list(&Disks::new(), &scope(), None, false, &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.pushed, 2);
        assert_eq!(summary.diagnostics, 1);
        assert!(sink.results[0].has_errors());
        assert!(sink.results[0].identity.is_none());
        assert!(sink.results[1].resource.is_none());
        assert!(sink.results[1].identity.is_some());
    }

    #[tokio::test]
    async fn test_page_error_aborts() {
        let transport = MockTransport::new();
        transport.expect_get("disks", json!({"items": [{"name": "d1"}], "nextPageToken": "t"}));
        transport.expect(
            Method::Get,
            "pageToken=t",
            Reply::Api(ApiError::new(403, "forbidden")),
        );

        let config = config();
        let mut sink = VecSink::default();
        let err = Lister::new(&transport, &config)
            .list(&Disks::new(), &scope(), None, false, &mut sink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Api(_)));
        assert_eq!(sink.results.len(), 1);
    }

    #[tokio::test]
    async fn test_channel_consumer_dropping_stops_traversal() {
        let transport = MockTransport::new();
        transport.expect_get(
            "disks",
            json!({
                "items": [{"name": "d1"}, {"name": "d2"}, {"name": "d3"}],
                "nextPageToken": "t"
            }),
        );

        let (mut sink, mut rx) = channel(1);
        let consumer = tokio::spawn(async move {
            let first = rx.recv().await.map(|r| r.display_name);
            drop(rx);
            first
        });

        let config = config();
        let summary = Lister::new(&transport, &config)
            .list(&Disks::new(), &scope(), None, false, &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(consumer.await.unwrap().as_deref(), Some("d1"));
        assert!(summary.stopped_early);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_undelivered_result_is_not_counted() {
        let transport = MockTransport::new();
        transport.expect_get(
            "disks",
            json!({"items": [{"name": "d1", "sizeGb": "huge"}, {"name": "d2"}]}),
        );

        let (mut sink, rx) = channel(1);
        drop(rx);

        let config = config();
        let summary = Lister::new(&transport, &config)
            .list(&Disks::new(), &scope(), None, false, &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert!(summary.stopped_early);
        assert_eq!(summary.pushed, 0);
        assert_eq!(summary.diagnostics, 0);
    }

    #[tokio::test]
    async fn test_collect_for_data_source() {
        let transport = MockTransport::new();
        transport.expect_get("disks", json!({"items": [{"name": "d1"}, {"name": "d2"}]}));

        let config = config();
        let states = Lister::new(&transport, &config)
            .collect(
                &Disks::new(),
                &scope(),
                Some(&ListFilter::new().and_eq("status", "READY")),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(states.len(), 2);
        assert_eq!(
            states[1].id().unwrap().as_str(),
            "projects/p/zones/us-central1-a/disks/d2"
        );
        assert!(transport.requests()[0].url.contains("filter="));
    }
}
