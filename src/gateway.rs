//! Outbound WebSocket gateway seam
//!
//! The adapter never talks to the management API directly; it goes through
//! [`GatewayClient`], which a deployment backs with its gateway of choice
//! (e.g. the API Gateway management endpoint). The only error detail the
//! core inspects is the HTTP status, so gone connections (410) can be
//! reaped during fan-out.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a gateway client
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway answered with a non-success HTTP status
    #[error("Gateway returned status {status} for connection {connection_id}: {message}")]
    Status {
        connection_id: String,
        status: u16,
        message: String,
    },

    /// The gateway could not be reached at all
    #[error("Gateway transport failure: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Build a status error
    pub fn status(connection_id: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        GatewayError::Status {
            connection_id: connection_id.into(),
            status,
            message: message.into(),
        }
    }

    /// Build the "gone" status error for a connection
    pub fn gone(connection_id: impl Into<String>) -> Self {
        GatewayError::status(connection_id, 410, "connection is gone")
    }

    /// HTTP status carried by this error, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            GatewayError::Transport(_) => None,
        }
    }

    /// Whether the gateway reported the connection permanently closed
    pub fn is_gone(&self) -> bool {
        self.http_status() == Some(410)
    }
}

/// Capability to push frames to, and drop, gateway-managed connections
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Deliver a text frame to the given connection
    async fn post_to_connection(
        &self,
        connection_id: &str,
        data: &[u8],
    ) -> std::result::Result<(), GatewayError>;

    /// Ask the gateway to close and forget the given connection
    async fn delete_connection(&self, connection_id: &str) -> std::result::Result<(), GatewayError>;
}
