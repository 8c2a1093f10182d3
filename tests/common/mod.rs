//! Shared fakes for the integration suites
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use graphql_ws_lambda::error::{Error, Result};
use graphql_ws_lambda::execution::{
    ExecutionAdapter, ExecutionResult, GraphqlError, OperationKind, Prepared, PreparedOperation,
    SubscribeOutcome,
};
use graphql_ws_lambda::gateway::{GatewayClient, GatewayError};
use graphql_ws_lambda::hooks::{ConnectDecision, ServerHooks, SubscribeDecision};
use graphql_ws_lambda::protocol::SubscribePayload;
use graphql_ws_lambda::pubsub::TopicSubscription;
use graphql_ws_lambda::ConnectionContext;

/// Install a test subscriber once so failing runs print adapter logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Gateway fake that records every frame and deletion, with scriptable
/// per-connection failures.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u16>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every send to this connection fail with the given HTTP status
    pub fn fail_sends(&self, connection_id: &str, status: u16) {
        self.failures
            .lock()
            .insert(connection_id.to_string(), status);
    }

    /// Frames delivered to one connection, parsed as JSON
    pub fn frames_to(&self, connection_id: &str) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .filter(|(cid, _)| cid == connection_id)
            .map(|(_, text)| serde_json::from_str(text).expect("gateway frames are JSON"))
            .collect()
    }

    /// Total number of frames delivered across all connections
    pub fn total_sent(&self) -> usize {
        self.sent.lock().len()
    }

    /// Connections the gateway was asked to delete
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        self.deleted.lock().clear();
    }
}

#[async_trait]
impl GatewayClient for RecordingGateway {
    async fn post_to_connection(
        &self,
        connection_id: &str,
        data: &[u8],
    ) -> std::result::Result<(), GatewayError> {
        if let Some(status) = self.failures.lock().get(connection_id) {
            return Err(GatewayError::status(connection_id, *status, "scripted failure"));
        }
        self.sent.lock().push((
            connection_id.to_string(),
            String::from_utf8_lossy(data).to_string(),
        ));
        Ok(())
    }

    async fn delete_connection(
        &self,
        connection_id: &str,
    ) -> std::result::Result<(), GatewayError> {
        self.deleted.lock().push(connection_id.to_string());
        Ok(())
    }
}

/// Execution adapter fake with canned per-query outcomes
#[derive(Default)]
pub struct CannedExecution {
    streams: Mutex<HashMap<String, Vec<String>>>,
    values: Mutex<HashMap<String, ExecutionResult>>,
    invalid: Mutex<HashMap<String, Vec<GraphqlError>>>,
    failing: Mutex<HashSet<String>>,
    wrap_events: Mutex<bool>,
}

impl CannedExecution {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Resolving this query yields a registrable channel on these topics
    pub fn stream(&self, query: &str, topics: &[&str]) {
        self.streams.lock().insert(
            query.to_string(),
            topics.iter().map(|t| t.to_string()).collect(),
        );
    }

    /// Resolving this query yields a single immediate result
    pub fn value(&self, query: &str, result: ExecutionResult) {
        self.values.lock().insert(query.to_string(), result);
    }

    /// Preparing this query fails validation with these errors
    pub fn invalid(&self, query: &str, errors: Vec<GraphqlError>) {
        self.invalid.lock().insert(query.to_string(), errors);
    }

    /// Resolving this query raises an execution error
    pub fn failing(&self, query: &str) {
        self.failing.lock().insert(query.to_string());
    }

    /// Make `map_event` wrap published events as `{"mapped": event}`
    pub fn wrap_events(&self) {
        *self.wrap_events.lock() = true;
    }
}

#[async_trait]
impl ExecutionAdapter for CannedExecution {
    async fn prepare(&self, payload: &SubscribePayload) -> Result<Prepared> {
        if let Some(errors) = self.invalid.lock().get(&payload.query) {
            return Ok(Prepared::Invalid(errors.clone()));
        }

        let trimmed = payload.query.trim_start();
        let kind = if trimmed.starts_with("subscription") {
            OperationKind::Subscription
        } else if trimmed.starts_with("mutation") {
            OperationKind::Mutation
        } else if trimmed.starts_with("query") || trimmed.starts_with('{') {
            OperationKind::Query
        } else {
            return Ok(Prepared::Invalid(vec![GraphqlError::new(
                "Unable to identify operation",
            )]));
        };
        Ok(Prepared::Operation(PreparedOperation::new(kind, payload.clone())))
    }

    async fn execute(
        &self,
        _context: &ConnectionContext,
        operation: &PreparedOperation,
    ) -> Result<ExecutionResult> {
        if let Some(result) = self.values.lock().get(&operation.payload.query) {
            return Ok(result.clone());
        }
        Ok(ExecutionResult::data(json!({ "echo": operation.payload.query })))
    }

    async fn resolve_subscription(
        &self,
        _context: &ConnectionContext,
        operation: &PreparedOperation,
    ) -> Result<SubscribeOutcome> {
        let query = &operation.payload.query;
        if self.failing.lock().contains(query) {
            return Err(Error::Execution("resolver blew up".to_string()));
        }
        if let Some(topics) = self.streams.lock().get(query) {
            return Ok(SubscribeOutcome::Stream(TopicSubscription::new(
                topics.clone(),
            )));
        }
        if let Some(result) = self.values.lock().get(query) {
            return Ok(SubscribeOutcome::Value(result.clone()));
        }
        Err(Error::Execution(format!("no canned outcome for {query}")))
    }

    async fn map_event(
        &self,
        _payload: &SubscribePayload,
        event: &Value,
    ) -> Result<ExecutionResult> {
        if *self.wrap_events.lock() {
            Ok(ExecutionResult::data(json!({ "mapped": event })))
        } else {
            Ok(ExecutionResult::data(event.clone()))
        }
    }
}

/// Hooks fake that records every invocation in order
#[derive(Default)]
pub struct RecordingHooks {
    calls: Mutex<Vec<String>>,
    completions: Mutex<Vec<(String, Option<SubscribePayload>)>>,
    reject_connect: Mutex<bool>,
    ack_payload: Mutex<Option<Value>>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_connections(&self) {
        *self.reject_connect.lock() = true;
    }

    pub fn ack_with(&self, payload: Value) {
        *self.ack_payload.lock() = Some(payload);
    }

    /// Hook invocations, e.g. `["on_connect", "on_complete:s1"]`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Arguments passed to `on_complete`, in invocation order
    pub fn completions(&self) -> Vec<(String, Option<SubscribePayload>)> {
        self.completions.lock().clone()
    }
}

#[async_trait]
impl ServerHooks for RecordingHooks {
    async fn on_connect(
        &self,
        _context: &ConnectionContext,
        _params: Option<&Value>,
    ) -> Result<ConnectDecision> {
        self.calls.lock().push("on_connect".to_string());
        if *self.reject_connect.lock() {
            return Ok(ConnectDecision::Reject);
        }
        Ok(ConnectDecision::Accept(self.ack_payload.lock().clone()))
    }

    async fn on_subscribe(
        &self,
        _context: &ConnectionContext,
        subscription_id: &str,
        _payload: &SubscribePayload,
    ) -> Result<SubscribeDecision> {
        self.calls.lock().push(format!("on_subscribe:{subscription_id}"));
        Ok(SubscribeDecision::Continue)
    }

    async fn on_complete(
        &self,
        _context: &ConnectionContext,
        subscription_id: &str,
        payload: Option<&SubscribePayload>,
    ) -> Result<()> {
        self.calls.lock().push(format!("on_complete:{subscription_id}"));
        self.completions
            .lock()
            .push((subscription_id.to_string(), payload.cloned()));
        Ok(())
    }

    async fn on_disconnect(
        &self,
        _context: &ConnectionContext,
        code: u16,
        _reason: &str,
    ) -> Result<()> {
        self.calls.lock().push(format!("on_disconnect:{code}"));
        Ok(())
    }

    async fn on_close(&self, _context: &ConnectionContext, code: u16, _reason: &str) -> Result<()> {
        self.calls.lock().push(format!("on_close:{code}"));
        Ok(())
    }
}
