//! Topic fan-out

use std::sync::Arc;

use futures::future;
use serde_json::{json, Value};

use crate::codec::keys::Channel;
use crate::error::{Error, Result};
use crate::execution::ExecutionAdapter;
use crate::gateway::GatewayClient;
use crate::protocol::{MessageCodec, ServerMessage, SubscribePayload};
use crate::state::PubSubStore;

/// How published payloads are shaped for delivery
#[derive(Clone)]
pub enum DeliveryMode {
    /// Wrap the payload as `{"data": payload}` verbatim
    Forward,
    /// Re-shape the payload per subscription through the execution adapter
    Execute(Arc<dyn ExecutionAdapter>),
}

/// Publishes payloads to every channel subscribed to a topic
///
/// Initialized once at cold start and reused across invocations. Delivery
/// failures never fail a publish: gone connections are reaped from the
/// registry, everything else is logged and skipped.
#[derive(Clone)]
pub struct PubSub {
    store: Arc<dyn PubSubStore>,
    gateway: Arc<dyn GatewayClient>,
    codec: Arc<dyn MessageCodec>,
    delivery: DeliveryMode,
}

impl PubSub {
    pub fn new(
        store: Arc<dyn PubSubStore>,
        gateway: Arc<dyn GatewayClient>,
        codec: Arc<dyn MessageCodec>,
    ) -> Self {
        Self {
            store,
            gateway,
            codec,
            delivery: DeliveryMode::Forward,
        }
    }

    /// Switch to schema-aware delivery through the given adapter
    pub fn with_execution(mut self, execution: Arc<dyn ExecutionAdapter>) -> Self {
        self.delivery = DeliveryMode::Execute(execution);
        self
    }

    /// Push a payload to every subscriber of a topic
    ///
    /// All sends are dispatched in parallel. Each successful send delivers
    /// the payload exactly once; no retries are made. A 410 from the
    /// gateway removes that connection from the registry before this
    /// returns, with cleanup errors swallowed.
    pub async fn publish(&self, topic: &str, payload: &Value) -> Result<()> {
        if topic.is_empty() {
            return Err(Error::Validation("publish topic must not be empty".to_string()));
        }

        let channels = self.store.channels(topic).await?;
        if channels.is_empty() {
            tracing::debug!(topic = %topic, "No subscribers for topic");
            return Ok(());
        }

        let sends = channels.iter().map(|channel| self.deliver(channel, payload));
        let results = future::join_all(sends).await;

        let mut delivered = 0usize;
        let mut gone: Vec<&Channel> = Vec::new();
        for (channel, result) in channels.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(err) if err.is_gone() => {
                    gone.push(channel);
                }
                Err(err) => {
                    tracing::warn!(
                        topic = %topic,
                        connection_id = %channel.connection_id,
                        subscription_id = %channel.subscription_id,
                        error = %err,
                        "Failed to deliver published payload"
                    );
                }
            }
        }

        for channel in &gone {
            tracing::info!(
                connection_id = %channel.connection_id,
                "Connection reported gone during publish; cleaning up"
            );
            if let Err(err) = self.store.disconnect(&channel.connection_id).await {
                tracing::debug!(
                    connection_id = %channel.connection_id,
                    error = %err,
                    "Ignoring cleanup failure for gone connection"
                );
            }
        }

        tracing::debug!(
            topic = %topic,
            delivered = delivered,
            gone = gone.len(),
            "Publish fan-out completed"
        );
        Ok(())
    }

    async fn deliver(&self, channel: &Channel, payload: &Value) -> Result<()> {
        let next_payload = match &self.delivery {
            DeliveryMode::Forward => json!({ "data": payload }),
            DeliveryMode::Execute(execution) => {
                match self.store.load_subscription(&channel.subscription_id).await? {
                    Some(raw) => {
                        let subscribe: SubscribePayload = serde_json::from_str(&raw)?;
                        let result = execution.map_event(&subscribe, payload).await?;
                        serde_json::to_value(result)?
                    }
                    // No stored operation to re-execute; forward as-is
                    None => json!({ "data": payload }),
                }
            }
        };

        let message = ServerMessage::Next {
            id: channel.subscription_id.clone(),
            payload: next_payload,
        };
        let text = self.codec.encode(&message)?;
        self.gateway
            .post_to_connection(&channel.connection_id, text.as_bytes())
            .await?;
        Ok(())
    }
}
