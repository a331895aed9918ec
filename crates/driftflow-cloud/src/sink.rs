//! Consumers of listing results

use crate::state::{ResourceIdentity, ResourceState};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A problem preparing one listing result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            detail: detail.into(),
        }
    }
}

/// One enumerated remote resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListResult {
    pub display_name: String,
    pub identity: Option<ResourceIdentity>,

    /// Full state, only when the caller asked for it
    pub resource: Option<ResourceState>,

    pub diagnostics: Vec<Diagnostic>,
}

impl ListResult {
    /// A result carrying only a diagnostic
    pub fn diagnostic(display_name: impl Into<String>, diagnostic: Diagnostic) -> Self {
        Self {
            display_name: display_name.into(),
            diagnostics: vec![diagnostic],
            ..Default::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Receives listing results one at a time.
///
/// Returning `false` asks the producer to stop: no further result is pushed
/// and no further page is fetched.
#[async_trait]
pub trait ResultSink: Send {
    async fn push(&mut self, result: ListResult) -> bool;
}

/// Sink backed by a closure
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: FnMut(ListResult) -> bool + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> ResultSink for CallbackSink<F>
where
    F: FnMut(ListResult) -> bool + Send,
{
    async fn push(&mut self, result: ListResult) -> bool {
        (self.callback)(result)
    }
}

/// Collects every result
#[derive(Debug, Default)]
pub struct VecSink {
    pub results: Vec<ListResult>,
}

#[async_trait]
impl ResultSink for VecSink {
    async fn push(&mut self, result: ListResult) -> bool {
        self.results.push(result);
        true
    }
}

/// Sink feeding a bounded channel.
///
/// `push` waits for capacity, so a slow consumer slows the traversal down.
/// Once the receiver is dropped `push` returns `false`.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<ListResult>,
}

/// Bounded channel pair for streaming results to another task
pub fn channel(capacity: usize) -> (ChannelSink, mpsc::Receiver<ListResult>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelSink { tx }, rx)
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn push(&mut self, result: ListResult) -> bool {
        self.tx.send(result).await.is_ok()
    }
}
