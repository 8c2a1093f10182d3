//! GraphQL execution seam
//!
//! Parsing, validation, and execution belong to the embedding application;
//! the adapter drives them through [`ExecutionAdapter`]. The one hard
//! requirement is the subscription path: `resolve_subscription` must
//! resolve exactly the root subscription field, synchronously producing
//! either a registrable channel or a single immediate result. It must never
//! produce an event stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ConnectionContext;
use crate::error::Result;
use crate::protocol::SubscribePayload;
use crate::pubsub::TopicSubscription;

/// A GraphQL error in response shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }
}

/// A GraphQL execution result in response shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlError>,
}

impl ExecutionResult {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }
}

/// The kind of operation a document resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// A parsed and validated operation, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedOperation {
    pub kind: OperationKind,
    pub payload: SubscribePayload,
}

impl PreparedOperation {
    pub fn new(kind: OperationKind, payload: SubscribePayload) -> Self {
        Self { kind, payload }
    }
}

/// Outcome of preparing a subscribe payload
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// The document parsed and validated
    Operation(PreparedOperation),
    /// Validation errors to deliver through an `error` frame
    Invalid(Vec<GraphqlError>),
}

/// Outcome of resolving the root subscription field
#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeOutcome {
    /// A registrable channel: record the subscription on these topics
    Stream(TopicSubscription),
    /// A single immediate result: deliver one `next` and finish
    Value(ExecutionResult),
}

/// The application's GraphQL engine, as the adapter consumes it
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// Parse and validate a subscribe payload. Documents without an
    /// identifiable operation are invalid.
    async fn prepare(&self, payload: &SubscribePayload) -> Result<Prepared>;

    /// Execute a query or mutation operation
    async fn execute(
        &self,
        context: &ConnectionContext,
        operation: &PreparedOperation,
    ) -> Result<ExecutionResult>;

    /// Resolve the root subscription field. Errors here abort the
    /// invocation after the socket is closed with 4400.
    async fn resolve_subscription(
        &self,
        context: &ConnectionContext,
        operation: &PreparedOperation,
    ) -> Result<SubscribeOutcome>;

    /// Shape one published event for one subscription (schema-aware
    /// delivery). The default forwards the event unchanged.
    async fn map_event(
        &self,
        _payload: &SubscribePayload,
        event: &Value,
    ) -> Result<ExecutionResult> {
        Ok(ExecutionResult::data(event.clone()))
    }
}
