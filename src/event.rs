//! Inbound event envelope and outbound response
//!
//! Every invocation of the adapter carries exactly one gateway lifecycle
//! event. The envelope mirrors the shape delivered by API-Gateway-style
//! hosts; the response tells the host how to answer the upgrade or frame.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of gateway lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebSocketEventType {
    Connect,
    Disconnect,
    Message,
}

/// One inbound WebSocket lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketEvent {
    /// Lifecycle event kind
    pub event_type: WebSocketEventType,

    /// Gateway route that matched this frame
    #[serde(default = "default_route_key")]
    pub route_key: String,

    /// Opaque connection identifier assigned by the gateway
    pub connection_id: String,

    /// Request headers (only populated on CONNECT)
    #[serde(default)]
    pub multi_value_headers: HashMap<String, Vec<String>>,

    /// Raw frame body (only populated on MESSAGE)
    #[serde(default)]
    pub body: Option<String>,

    /// Peer-reported close code (only populated on DISCONNECT)
    #[serde(default)]
    pub disconnect_status_code: Option<u16>,

    /// Peer-reported close reason (only populated on DISCONNECT)
    #[serde(default)]
    pub disconnect_reason: Option<String>,

    /// Host request context snapshot, stored into the connection's `extra`
    #[serde(default)]
    pub request_context: Option<Value>,
}

impl WebSocketEvent {
    /// Build a CONNECT event
    pub fn connect(connection_id: impl Into<String>) -> Self {
        Self::new(WebSocketEventType::Connect, "$connect", connection_id)
    }

    /// Build a MESSAGE event on the default route
    pub fn message(connection_id: impl Into<String>, body: impl Into<String>) -> Self {
        let mut event = Self::new(WebSocketEventType::Message, "$default", connection_id);
        event.body = Some(body.into());
        event
    }

    /// Build a DISCONNECT event
    pub fn disconnect(connection_id: impl Into<String>) -> Self {
        Self::new(WebSocketEventType::Disconnect, "$disconnect", connection_id)
    }

    fn new(
        event_type: WebSocketEventType,
        route_key: &str,
        connection_id: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            route_key: route_key.to_string(),
            connection_id: connection_id.into(),
            multi_value_headers: HashMap::new(),
            body: None,
            disconnect_status_code: None,
            disconnect_reason: None,
            request_context: None,
        }
    }

    /// Add a header value (headers may repeat)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.multi_value_headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// All values for a header, case-insensitively, with comma-separated
    /// entries split out.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.multi_value_headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .flat_map(|(_, values)| values.iter())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect()
    }
}

fn default_route_key() -> String {
    "$default".to_string()
}

/// Response returned to the host for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl GatewayResponse {
    /// Plain 200 acknowledgement
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// 200 acknowledgement carrying a single response header
    pub fn ok_with_header(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut response = Self::ok();
        response.headers.insert(name.into(), value.into());
        response
    }

    /// 400 rejection with a JSON body
    pub fn bad_request(body: impl Into<String>) -> Self {
        Self {
            status_code: 400,
            headers: HashMap::new(),
            body: Some(body.into()),
        }
    }
}
