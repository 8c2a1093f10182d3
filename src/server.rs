//! Protocol state machine
//!
//! One [`SubscriptionServer`] is built at cold start and handles every
//! gateway lifecycle event. Each invocation is independent: the machine
//! re-reads protocol state before every transition, performs its registry
//! mutations atomically through the store, and flushes context changes
//! before acknowledging the event.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::AdapterConfig;
use crate::context::ConnectionContext;
use crate::emitter::SubscriptionEmitter;
use crate::error::{Error, Result};
use crate::event::{GatewayResponse, WebSocketEvent, WebSocketEventType};
use crate::execution::{ExecutionAdapter, OperationKind, Prepared, PreparedOperation, SubscribeOutcome};
use crate::gateway::GatewayClient;
use crate::hooks::{ConnectDecision, NoopHooks, ServerHooks, SubscribeDecision};
use crate::protocol::{
    ClientMessage, CloseCode, JsonCodec, MessageCodec, SubscribePayload, ServerMessage,
    SUPPORTED_PROTOCOLS,
};
use crate::pubsub::PubSub;
use crate::socket::Socket;
use crate::state::PubSubStore;

/// Handler for MESSAGE events arriving on routes other than `$default`
#[async_trait]
pub trait CustomRouteHandler: Send + Sync {
    async fn handle(&self, event: &WebSocketEvent) -> Result<GatewayResponse>;
}

/// The stateless protocol server
pub struct SubscriptionServer {
    store: Arc<dyn PubSubStore>,
    gateway: Arc<dyn GatewayClient>,
    execution: Arc<dyn ExecutionAdapter>,
    hooks: Arc<dyn ServerHooks>,
    codec: Arc<dyn MessageCodec>,
    emitter: SubscriptionEmitter,
    custom_route_handler: Option<Arc<dyn CustomRouteHandler>>,
}

impl SubscriptionServer {
    /// Start building a server around its three required collaborators
    pub fn builder(
        store: Arc<dyn PubSubStore>,
        gateway: Arc<dyn GatewayClient>,
        execution: Arc<dyn ExecutionAdapter>,
    ) -> SubscriptionServerBuilder {
        SubscriptionServerBuilder {
            store,
            gateway,
            execution,
            hooks: None,
            codec: None,
            custom_route_handler: None,
        }
    }

    /// A publisher wired to this server's store and gateway, in raw
    /// forwarding mode. Applications publish through this between events.
    pub fn pubsub(&self) -> PubSub {
        PubSub::new(self.store.clone(), self.gateway.clone(), self.codec.clone())
    }

    /// Handle one gateway lifecycle event
    pub async fn handle(&self, event: WebSocketEvent) -> Result<GatewayResponse> {
        tracing::debug!(
            event_type = ?event.event_type,
            connection_id = %event.connection_id,
            route_key = %event.route_key,
            "Handling gateway event"
        );

        match event.event_type {
            WebSocketEventType::Connect => self.handle_connect(&event).await,
            WebSocketEventType::Message => self.handle_message(&event).await,
            WebSocketEventType::Disconnect => self.handle_disconnect(&event).await,
        }
    }

    fn socket(&self, connection_id: &str) -> Socket {
        Socket::new(
            connection_id,
            self.gateway.clone(),
            self.codec.clone(),
            self.store.clone(),
        )
    }

    async fn handle_connect(&self, event: &WebSocketEvent) -> Result<GatewayResponse> {
        let offered = event.header_values("Sec-WebSocket-Protocol");
        let chosen = SUPPORTED_PROTOCOLS
            .iter()
            .find(|supported| offered.contains(supported))
            .copied();

        let Some(protocol) = chosen else {
            tracing::info!(
                connection_id = %event.connection_id,
                offered = ?offered,
                "Rejecting connection with no supported subprotocol"
            );
            let body = json!({
                "error": "SubprotocolNegotiationFailed",
                "message": "The client offered no supported WebSocket subprotocol",
                "supportedProtocol": Value::Null,
            });
            return Ok(GatewayResponse::bad_request(body.to_string()));
        };

        let extra = event
            .request_context
            .clone()
            .unwrap_or_else(|| json!({}));
        let mut socket = self.socket(&event.connection_id);
        socket
            .create_context(ConnectionContext::with_extra(extra))
            .await?;
        socket.flush().await?;

        tracing::info!(
            connection_id = %event.connection_id,
            protocol = %protocol,
            "Connection accepted"
        );
        Ok(GatewayResponse::ok_with_header(
            "Sec-WebSocket-Protocol",
            protocol,
        ))
    }

    async fn handle_message(&self, event: &WebSocketEvent) -> Result<GatewayResponse> {
        if event.route_key != "$default" {
            if let Some(handler) = &self.custom_route_handler {
                return handler.handle(event).await;
            }
        }

        let mut socket = self.socket(&event.connection_id);

        let message = match self.codec.decode(event.body.as_deref().unwrap_or("")) {
            Ok(message) => message,
            Err(err) => {
                tracing::info!(
                    connection_id = %event.connection_id,
                    error = %err,
                    "Closing connection on invalid frame"
                );
                socket
                    .close_with(CloseCode::BadRequest.code(), "Invalid message received")
                    .await?;
                socket.flush().await?;
                return Ok(GatewayResponse::ok());
            }
        };

        match message {
            ClientMessage::ConnectionInit { payload } => {
                self.handle_connection_init(&mut socket, payload).await?;
            }
            ClientMessage::Ping { payload } => {
                socket.send(&ServerMessage::Pong { payload }).await?;
            }
            ClientMessage::Pong { .. } => {
                tracing::debug!(connection_id = %event.connection_id, "Pong received");
            }
            ClientMessage::Subscribe { id, payload } => {
                self.handle_subscribe(&mut socket, &id, payload).await?;
            }
            ClientMessage::Complete { id } => {
                self.handle_complete(&mut socket, &id).await?;
            }
        }

        socket.flush().await?;
        Ok(GatewayResponse::ok())
    }

    async fn handle_connection_init(
        &self,
        socket: &mut Socket,
        payload: Option<Value>,
    ) -> Result<()> {
        if socket.context().await?.context().connection_init_received {
            socket.close(CloseCode::TooManyInitialisationRequests).await?;
            return Ok(());
        }

        let snapshot = socket.context().await?.snapshot();
        let ack_payload = match self.hooks.on_connect(&snapshot, payload.as_ref()).await? {
            ConnectDecision::Reject => {
                tracing::info!(
                    connection_id = %socket.connection_id(),
                    "Connection rejected by on_connect"
                );
                socket.close(CloseCode::Forbidden).await?;
                return Ok(());
            }
            ConnectDecision::Accept(ack_payload) => ack_payload,
        };

        let context = socket.context().await?;
        context.set_init_received(true);
        context.set_acknowledged(true);
        if let Some(params) = payload {
            context.set_connection_params(params);
        }

        socket
            .send(&ServerMessage::ConnectionAck {
                payload: ack_payload,
            })
            .await?;

        tracing::debug!(connection_id = %socket.connection_id(), "Connection acknowledged");
        Ok(())
    }

    async fn handle_subscribe(
        &self,
        socket: &mut Socket,
        subscription_id: &str,
        payload: SubscribePayload,
    ) -> Result<()> {
        let context = socket.context().await?.snapshot();
        if !context.acknowledged {
            socket.close(CloseCode::Unauthorized).await?;
            return Ok(());
        }

        if self.store.is_registered(subscription_id).await? {
            socket
                .close_with(
                    CloseCode::SubscriberAlreadyExists.code(),
                    &format!("Subscriber for {subscription_id} already exists"),
                )
                .await?;
            return Ok(());
        }

        self.store
            .save_subscription(subscription_id, &serde_json::to_string(&payload)?)
            .await?;

        let operation = match self
            .hooks
            .on_subscribe(&context, subscription_id, &payload)
            .await?
        {
            SubscribeDecision::Reject(errors) => {
                self.emitter.error(socket, subscription_id, errors).await?;
                self.store.delete_subscription(subscription_id).await?;
                return Ok(());
            }
            SubscribeDecision::Execute(operation) => operation,
            SubscribeDecision::Continue => match self.execution.prepare(&payload).await? {
                Prepared::Operation(operation) => operation,
                Prepared::Invalid(errors) => {
                    self.emitter.error(socket, subscription_id, errors).await?;
                    self.store.delete_subscription(subscription_id).await?;
                    return Ok(());
                }
            },
        };

        match operation.kind {
            OperationKind::Subscription => {
                self.resolve_subscription(socket, subscription_id, &context, &operation)
                    .await
            }
            OperationKind::Query | OperationKind::Mutation => {
                let result = self.execution.execute(&context, &operation).await?;
                self.emitter.next(socket, subscription_id, &result).await?;
                self.emitter.complete(socket, subscription_id, true).await?;
                self.store.delete_subscription(subscription_id).await?;
                Ok(())
            }
        }
    }

    async fn resolve_subscription(
        &self,
        socket: &mut Socket,
        subscription_id: &str,
        context: &ConnectionContext,
        operation: &PreparedOperation,
    ) -> Result<()> {
        let outcome = match self.execution.resolve_subscription(context, operation).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // Re-raised so the host fails the invocation
                tracing::error!(
                    connection_id = %socket.connection_id(),
                    subscription_id = %subscription_id,
                    error = %err,
                    "Subscription resolver failed"
                );
                if let Err(close_err) = socket.close(CloseCode::BadRequest).await {
                    tracing::warn!(
                        connection_id = %socket.connection_id(),
                        error = %close_err,
                        "Failed to close connection after resolver error"
                    );
                }
                return Err(err);
            }
        };

        match outcome {
            SubscribeOutcome::Stream(channel) => {
                self.store
                    .register(socket.connection_id(), subscription_id, channel.topics())
                    .await?;
                tracing::info!(
                    connection_id = %socket.connection_id(),
                    subscription_id = %subscription_id,
                    topics = channel.topics().len(),
                    "Subscription registered"
                );
            }
            SubscribeOutcome::Value(result) => {
                // Single immediate result; the completion is not notified
                self.emitter.next(socket, subscription_id, &result).await?;
                self.store.delete_subscription(subscription_id).await?;
            }
        }
        Ok(())
    }

    async fn handle_complete(&self, socket: &mut Socket, subscription_id: &str) -> Result<()> {
        self.store
            .unregister(socket.connection_id(), subscription_id)
            .await?;

        let raw = self
            .store
            .load_subscription(subscription_id)
            .await?
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "Missing subscribe record for subscription {subscription_id}"
                ))
            })?;
        let payload: SubscribePayload = serde_json::from_str(&raw)?;

        let context = socket.context().await?.snapshot();
        self.hooks
            .on_complete(&context, subscription_id, Some(&payload))
            .await?;
        self.store.delete_subscription(subscription_id).await?;

        tracing::debug!(
            connection_id = %socket.connection_id(),
            subscription_id = %subscription_id,
            "Subscription completed"
        );
        Ok(())
    }

    async fn handle_disconnect(&self, event: &WebSocketEvent) -> Result<GatewayResponse> {
        let code = event.disconnect_status_code.unwrap_or(1001);
        let reason = event.disconnect_reason.as_deref().unwrap_or("Going away");

        let mut socket = self.socket(&event.connection_id);

        // Snapshot before the registry sweep so completions still see the
        // subscription list
        let subscription_ids = self
            .store
            .connection_subscriptions(&event.connection_id)
            .await?;
        self.store.disconnect(&event.connection_id).await?;

        let context = socket.context().await?.snapshot();
        for subscription_id in &subscription_ids {
            let payload = match self.store.load_subscription(subscription_id).await? {
                Some(raw) => Some(serde_json::from_str::<SubscribePayload>(&raw)?),
                None => None,
            };
            self.hooks
                .on_complete(&context, subscription_id, payload.as_ref())
                .await?;
            self.store.delete_subscription(subscription_id).await?;
        }

        if context.acknowledged {
            self.hooks.on_disconnect(&context, code, reason).await?;
        }
        self.hooks.on_close(&context, code, reason).await?;

        socket.flush().await?;
        self.store.delete_context(&event.connection_id).await?;

        tracing::info!(
            connection_id = %event.connection_id,
            code = code,
            subscriptions = subscription_ids.len(),
            "Connection disconnected"
        );
        Ok(GatewayResponse::ok())
    }
}

/// Builder for [`SubscriptionServer`]
pub struct SubscriptionServerBuilder {
    store: Arc<dyn PubSubStore>,
    gateway: Arc<dyn GatewayClient>,
    execution: Arc<dyn ExecutionAdapter>,
    hooks: Option<Arc<dyn ServerHooks>>,
    codec: Option<Arc<dyn MessageCodec>>,
    custom_route_handler: Option<Arc<dyn CustomRouteHandler>>,
}

impl SubscriptionServerBuilder {
    /// Set the application hooks (defaults to no-ops)
    pub fn hooks(mut self, hooks: Arc<dyn ServerHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Set the frame codec (defaults to plain JSON)
    pub fn codec(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Delegate MESSAGE events on non-default routes to this handler
    pub fn custom_route_handler(mut self, handler: Arc<dyn CustomRouteHandler>) -> Self {
        self.custom_route_handler = Some(handler);
        self
    }

    pub fn build(self) -> SubscriptionServer {
        let hooks = self.hooks.unwrap_or_else(|| Arc::new(NoopHooks));
        SubscriptionServer {
            store: self.store,
            gateway: self.gateway,
            execution: self.execution,
            emitter: SubscriptionEmitter::new(hooks.clone()),
            hooks,
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonCodec)),
            custom_route_handler: self.custom_route_handler,
        }
    }
}

/// Build a server from configuration with the default store factory
pub async fn create_server(
    config: &AdapterConfig,
    gateway: Arc<dyn GatewayClient>,
    execution: Arc<dyn ExecutionAdapter>,
) -> Result<SubscriptionServer> {
    let store = crate::state::create_store(config).await?;
    Ok(SubscriptionServer::builder(store, gateway, execution).build())
}
