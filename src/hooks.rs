//! Application hook points
//!
//! Every hook has a no-op default, so an application implements only what
//! it needs. Hooks receive a snapshot of the connection context; mutations
//! of protocol state stay inside the machine.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ConnectionContext;
use crate::error::Result;
use crate::execution::{GraphqlError, PreparedOperation};
use crate::protocol::SubscribePayload;

/// Decision returned by [`ServerHooks::on_connect`]
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectDecision {
    /// Accept the connection; an optional payload rides on `connection_ack`
    Accept(Option<Value>),
    /// Reject the connection; the socket closes with 4403
    Reject,
}

/// Decision returned by [`ServerHooks::on_subscribe`]
#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeDecision {
    /// Let the execution adapter prepare the operation from the payload
    Continue,
    /// Refuse the operation; the errors are delivered via an `error` frame
    Reject(Vec<GraphqlError>),
    /// Skip preparation and run this operation instead
    Execute(PreparedOperation),
}

/// Lifecycle hooks invoked by the protocol machine
#[async_trait]
pub trait ServerHooks: Send + Sync {
    /// Called on `connection_init`, before the connection is acknowledged.
    /// `params` is the client's init payload.
    async fn on_connect(
        &self,
        _context: &ConnectionContext,
        _params: Option<&Value>,
    ) -> Result<ConnectDecision> {
        Ok(ConnectDecision::Accept(None))
    }

    /// Called on `subscribe`, after the payload record is persisted
    async fn on_subscribe(
        &self,
        _context: &ConnectionContext,
        _subscription_id: &str,
        _payload: &SubscribePayload,
    ) -> Result<SubscribeDecision> {
        Ok(SubscribeDecision::Continue)
    }

    /// Called before a `next` frame is sent; a returned value replaces the
    /// frame payload.
    async fn on_next(
        &self,
        _context: &ConnectionContext,
        _subscription_id: &str,
        _payload: &Value,
    ) -> Result<Option<Value>> {
        Ok(None)
    }

    /// Called before an `error` frame is sent; a returned value replaces
    /// the frame payload.
    async fn on_error(
        &self,
        _context: &ConnectionContext,
        _subscription_id: &str,
        _errors: &[GraphqlError],
    ) -> Result<Option<Value>> {
        Ok(None)
    }

    /// Called once per registered subscription when it ends, with the
    /// stored subscribe payload when it is still available.
    async fn on_complete(
        &self,
        _context: &ConnectionContext,
        _subscription_id: &str,
        _payload: Option<&SubscribePayload>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called on DISCONNECT for connections that were acknowledged
    async fn on_disconnect(
        &self,
        _context: &ConnectionContext,
        _code: u16,
        _reason: &str,
    ) -> Result<()> {
        Ok(())
    }

    /// Called on every DISCONNECT, acknowledged or not
    async fn on_close(&self, _context: &ConnectionContext, _code: u16, _reason: &str) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl ServerHooks for NoopHooks {}
