//! Message types for the GraphQL-over-WebSocket protocol
//!
//! Frames are JSON-encoded and tagged by `type`. The synthetic `close`
//! frame is not part of the protocol proper: it mimics a WebSocket close to
//! the client right before the gateway drops the underlying socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// The current subprotocol
pub const GRAPHQL_TRANSPORT_WS_PROTOCOL: &str = "graphql-transport-ws";
/// The legacy subprotocol, accepted for older clients
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";
/// Subprotocols the adapter negotiates, in order of preference
pub const SUPPORTED_PROTOCOLS: [&str; 2] = [GRAPHQL_TRANSPORT_WS_PROTOCOL, GRAPHQL_WS_PROTOCOL];

/// Message sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Handshake after the socket opens
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Liveness probe; the server echoes the payload back in a pong
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Answer to a server ping
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Start an operation under a client-chosen id
    Subscribe { id: String, payload: SubscribePayload },
    /// Stop the operation with the given id
    Complete { id: String },
}

/// Message sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake acknowledgement
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Operation result delivery
    Next { id: String, payload: Value },
    /// Operation failure delivery
    Error { id: String, payload: Value },
    /// Operation end marker
    Complete { id: String },
    /// Synthetic close frame, sent before the gateway drops the socket
    Close { code: u16, reason: String },
}

impl ServerMessage {
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close {
            code,
            reason: reason.into(),
        }
    }
}

/// The verbatim operation request carried by a `subscribe` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribePayload {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl SubscribePayload {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: None,
            extensions: None,
        }
    }
}

/// Close codes the protocol machine issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    SubscriberAlreadyExists,
    TooManyInitialisationRequests,
}

impl CloseCode {
    pub fn code(self) -> u16 {
        match self {
            CloseCode::BadRequest => 4400,
            CloseCode::Unauthorized => 4401,
            CloseCode::Forbidden => 4403,
            CloseCode::SubscriberAlreadyExists => 4409,
            CloseCode::TooManyInitialisationRequests => 4429,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            CloseCode::BadRequest => "Bad request",
            CloseCode::Unauthorized => "Unauthorized",
            CloseCode::Forbidden => "Forbidden",
            CloseCode::SubscriberAlreadyExists => "Subscriber already exists",
            CloseCode::TooManyInitialisationRequests => "Too many initialisation requests",
        }
    }
}

/// Frame (de)serialization seam
///
/// The default implementation is plain JSON; deployments that need custom
/// revival or replacement of values provide their own codec.
pub trait MessageCodec: Send + Sync {
    fn encode(&self, message: &ServerMessage) -> Result<String>;
    fn decode(&self, text: &str) -> Result<ClientMessage>;
}

/// Plain serde_json codec
#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, message: &ServerMessage) -> Result<String> {
        Ok(serde_json::to_string(message)?)
    }

    fn decode(&self, text: &str) -> Result<ClientMessage> {
        Ok(serde_json::from_str(text)?)
    }
}
