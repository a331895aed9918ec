//! Token-based pagination over list endpoints
//!
//! Pages are fetched strictly one after another: the request for page N+1
//! carries the `nextPageToken` of page N as `pageToken`. An absent or empty
//! token ends the traversal. There is no page cap.

use crate::error::{CloudError, Result};
use crate::filter::ListFilter;
use crate::transport::{
    ApiRequest, RetryPredicate, Transport, add_query_params, is_429_quota_error, send_cancellable,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What to list
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub url: String,
    pub filter: Option<String>,

    /// Key of the item array in each page (`items` unless the API differs)
    pub items_key: String,

    pub retry_predicates: Vec<RetryPredicate>,
}

impl ListRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filter: None,
            items_key: "items".to_string(),
            // walking many pages in a row easily trips rate limits
            retry_predicates: vec![is_429_quota_error],
        }
    }

    pub fn with_filter(mut self, filter: Option<&ListFilter>) -> Self {
        self.filter = filter.and_then(ListFilter::render);
        self
    }

    pub fn with_items_key(mut self, key: impl Into<String>) -> Self {
        self.items_key = key.into();
        self
    }

    pub fn with_retry_predicates(mut self, predicates: &[RetryPredicate]) -> Self {
        self.retry_predicates.extend_from_slice(predicates);
        self
    }
}

/// One fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    pub items: Vec<Value>,
    pub next_page_token: Option<String>,
}

/// Cursor over the pages of a [`ListRequest`]
pub struct Paginator<'a> {
    transport: &'a dyn Transport,
    request: ListRequest,
    params: BTreeMap<String, String>,
    pages: usize,
    done: bool,
}

impl<'a> Paginator<'a> {
    pub fn new(transport: &'a dyn Transport, request: ListRequest) -> Self {
        let mut params = BTreeMap::new();
        if let Some(filter) = request.filter.as_ref().filter(|f| !f.is_empty()) {
            params.insert("filter".to_string(), filter.clone());
        }
        Self {
            transport,
            request,
            params,
            pages: 0,
            done: false,
        }
    }

    /// Fetch the next page, `Ok(None)` once the traversal is complete.
    ///
    /// A failed request ends the traversal; pages already returned stay
    /// valid.
    pub async fn next_page(&mut self, cancel: &CancellationToken) -> Result<Option<Page>> {
        if self.done {
            return Ok(None);
        }

        let url = add_query_params(&self.request.url, &self.params)?;
        debug!(url = %url, page = self.pages + 1, "fetching page");

        let request = ApiRequest::get(url).with_retry_predicates(&self.request.retry_predicates);
        let response = match send_cancellable(self.transport, request, cancel).await {
            Ok(response) => response.unwrap_or(Value::Null),
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        let items = match response.get(&self.request.items_key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                self.done = true;
                return Err(CloudError::Inconsistent(format!(
                    "expected an array under {:?}, got {}",
                    self.request.items_key, other
                )));
            }
        };

        let next_page_token = response
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        match &next_page_token {
            Some(token) => {
                self.params.insert("pageToken".to_string(), token.clone());
            }
            None => self.done = true,
        }
        self.pages += 1;

        Ok(Some(Page {
            number: self.pages,
            items,
            next_page_token,
        }))
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }
}

/// Every raw item of every page
pub async fn collect_all(
    transport: &dyn Transport,
    request: ListRequest,
    cancel: &CancellationToken,
) -> Result<Vec<Value>> {
    let mut paginator = Paginator::new(transport, request);
    let mut items = Vec::new();
    while let Some(page) = paginator.next_page(cancel).await? {
        items.extend(page.items);
    }
    Ok(items)
}
