//! driftflow cloud engine
//!
//! Reconciles declared resource state against operation-based control-plane
//! APIs and enumerates existing remote resources page by page.
//!
//! # Components
//!
//! - **Reconciler**: create / read / update / delete with drift detection and
//!   partial updates (`updateMask`)
//! - **Operation waiter**: polls long-running operations with exponential
//!   backoff, bounded by a deadline and a cancellation token
//! - **Paginator / Lister**: token-based pagination streaming typed results
//!   to a [`ResultSink`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            caller (plan / apply / list)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                driftflow-cloud                   │
//! │  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │  Reconciler  │  │  Lister ─▶ Paginator     │ │
//! │  └──────┬───────┘  └────────────┬─────────────┘ │
//! │  ┌──────▼───────┐  ┌────────────▼─────────────┐ │
//! │  │   Waiter     │  │  ResultSink              │ │
//! │  └──────┬───────┘  └──────────────────────────┘ │
//! │  ┌──────▼──────────────────────────────────────┐ │
//! │  │  trait Transport { send(ApiRequest) }       │ │
//! │  └─────────────────────────────────────────────┘ │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────┐
//! │  driftflow-cloud-google         │
//! │  (reqwest transport, resources) │
//! └─────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use driftflow_cloud::{ProviderConfig, Reconciler, ResourceState};
//! use tokio_util::sync::CancellationToken;
//!
//! let reconciler = Reconciler::new(transport, ProviderConfig::new().with_project("my-project"));
//! let desired = ResourceState::new()
//!     .with_attribute("name", "rule-1")
//!     .with_attribute("disk_limit_mib", 1024);
//!
//! let state = reconciler.create(&quota_rule, &desired, &CancellationToken::new()).await?;
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod list;
pub mod mock;
pub mod names;
pub mod operation;
pub mod paginate;
pub mod plan;
pub mod reconciler;
pub mod resource;
pub mod schema;
pub mod sink;
pub mod state;
pub mod template;
pub mod transport;

// Re-exports
pub use config::{PollConfig, ProviderConfig, RetryConfig, Timeouts};
pub use diff::{Equivalence, ProjectNameOrNumber, ResourceNameEquivalence, UpdateMask};
pub use error::{ApiError, CloudError, Result};
pub use filter::{FilterOp, ListFilter};
pub use list::{ListSummary, Lister};
pub use operation::{OperationError, OperationHandle, OperationState, OperationWaiter};
pub use paginate::{ListRequest, Page, Paginator, collect_all};
pub use plan::{Action, ActionType, Plan, PlanSummary};
pub use reconciler::Reconciler;
pub use resource::{ListableResource, ReadOutcome, ResourceDefinition, ResourceKind};
pub use schema::{FieldCodec, FieldMode, FieldSchema, Fixed64Codec, ResourceSchema};
pub use sink::{CallbackSink, ChannelSink, Diagnostic, ListResult, ResultSink, VecSink};
pub use state::{DesiredState, ObservedState, ResourceIdentity, ResourceState};
pub use transport::{ApiRequest, Method, RetryPredicate, Transport};

pub use tokio_util::sync::CancellationToken;
