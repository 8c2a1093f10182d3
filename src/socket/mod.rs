//! Per-invocation view over one connection
//!
//! A socket is rebuilt for every invocation and holds no cross-invocation
//! state: context access is lazy and memoized for the invocation, sends go
//! straight to the gateway, and `flush` persists whatever the invocation
//! changed.

use std::sync::Arc;

use crate::context::{ConnectionContext, ContextStore, TrackedContext};
use crate::error::Result;
use crate::gateway::GatewayClient;
use crate::protocol::{CloseCode, MessageCodec, ServerMessage};
use crate::state::PubSubStore;

/// Handle to one connection for the duration of one invocation
pub struct Socket {
    connection_id: String,
    gateway: Arc<dyn GatewayClient>,
    codec: Arc<dyn MessageCodec>,
    context: ContextStore,
}

impl Socket {
    pub fn new(
        connection_id: impl Into<String>,
        gateway: Arc<dyn GatewayClient>,
        codec: Arc<dyn MessageCodec>,
        store: Arc<dyn PubSubStore>,
    ) -> Self {
        let connection_id = connection_id.into();
        Self {
            context: ContextStore::new(connection_id.clone(), store),
            connection_id,
            gateway,
            codec,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// The connection's context, loaded on first use
    pub async fn context(&mut self) -> Result<&mut TrackedContext> {
        self.context.load().await
    }

    /// Replace the stored context, bypassing change tracking
    pub async fn create_context(&mut self, context: ConnectionContext) -> Result<()> {
        self.context.create(context).await
    }

    /// Frame and deliver one message to the client
    pub async fn send(&self, message: &ServerMessage) -> Result<()> {
        let text = self.codec.encode(message)?;
        self.gateway
            .post_to_connection(&self.connection_id, text.as_bytes())
            .await?;
        Ok(())
    }

    /// Close the connection with a protocol close code
    pub async fn close(&self, code: CloseCode) -> Result<()> {
        self.close_with(code.code(), code.reason()).await
    }

    /// Mimic a WebSocket close to the client, then have the gateway drop
    /// the socket. The close frame is best-effort: a peer that is already
    /// gone still gets deleted.
    pub async fn close_with(&self, code: u16, reason: &str) -> Result<()> {
        if let Err(err) = self.send(&ServerMessage::close(code, reason)).await {
            tracing::warn!(
                connection_id = %self.connection_id,
                error = %err,
                "Failed to deliver close frame"
            );
        }

        tracing::debug!(
            connection_id = %self.connection_id,
            code = code,
            reason = reason,
            "Closing connection"
        );

        match self.gateway.delete_connection(&self.connection_id).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_gone() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Persist pending context changes
    pub async fn flush(&mut self) -> Result<()> {
        self.context.flush().await
    }
}
