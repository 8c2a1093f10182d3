//! Framing of operation results back to the client

use std::sync::Arc;

use crate::error::Result;
use crate::execution::{ExecutionResult, GraphqlError};
use crate::hooks::ServerHooks;
use crate::protocol::ServerMessage;
use crate::socket::Socket;

/// Frames `next`, `error`, and `complete` messages for one subscription,
/// giving hooks the chance to replace payloads before they go out.
#[derive(Clone)]
pub struct SubscriptionEmitter {
    hooks: Arc<dyn ServerHooks>,
}

impl SubscriptionEmitter {
    pub fn new(hooks: Arc<dyn ServerHooks>) -> Self {
        Self { hooks }
    }

    /// Deliver one execution result
    pub async fn next(
        &self,
        socket: &mut Socket,
        subscription_id: &str,
        result: &ExecutionResult,
    ) -> Result<()> {
        let context = socket.context().await?.snapshot();
        let default_payload = serde_json::to_value(result)?;
        let payload = self
            .hooks
            .on_next(&context, subscription_id, &default_payload)
            .await?
            .unwrap_or(default_payload);

        socket
            .send(&ServerMessage::Next {
                id: subscription_id.to_string(),
                payload,
            })
            .await
    }

    /// Deliver operation errors
    pub async fn error(
        &self,
        socket: &mut Socket,
        subscription_id: &str,
        errors: Vec<GraphqlError>,
    ) -> Result<()> {
        let context = socket.context().await?.snapshot();
        let payload = match self
            .hooks
            .on_error(&context, subscription_id, &errors)
            .await?
        {
            Some(replacement) => replacement,
            None => serde_json::to_value(&errors)?,
        };

        socket
            .send(&ServerMessage::Error {
                id: subscription_id.to_string(),
                payload,
            })
            .await
    }

    /// Mark the operation finished. Single-result operations notify the
    /// client; client-initiated completions do not echo.
    pub async fn complete(
        &self,
        socket: &Socket,
        subscription_id: &str,
        notify_client: bool,
    ) -> Result<()> {
        if !notify_client {
            return Ok(());
        }
        socket
            .send(&ServerMessage::Complete {
                id: subscription_id.to_string(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_next_payload_shape() {
        let result = ExecutionResult {
            data: Some(json!({ "messaged": "hi" })),
            errors: vec![GraphqlError::new("warning")],
        };
        let payload = serde_json::to_value(&result).unwrap();
        assert_eq!(
            payload,
            json!({
                "data": { "messaged": "hi" },
                "errors": [{ "message": "warning" }],
            })
        );
    }

    #[test]
    fn test_default_error_payload_shape() {
        let errors = vec![GraphqlError::new("a"), GraphqlError::new("b")];
        let payload = serde_json::to_value(&errors).unwrap();
        assert_eq!(payload, json!([{ "message": "a" }, { "message": "b" }]));
    }
}
