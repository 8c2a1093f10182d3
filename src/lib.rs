//! GraphQL-over-WebSocket subscriptions for stateless function runtimes
//!
//! A traditional subscription server holds long-lived sockets and keeps
//! per-connection state in memory. On a request/response runtime every
//! WebSocket frame arrives as an independent invocation, so this crate
//! externalizes all connection state into a shared key-value store and
//! reconciles it atomically under concurrent invocations.
//!
//! # Architecture
//!
//! - **Codec**: namespaced key layout, type-tagged value encoding, and
//!   dot-path flattening for context trees
//! - **Context**: the per-connection protocol record, change-tracked within
//!   an invocation and batch-persisted at its end
//! - **State**: the storage seam with Redis (scripted atomic registry
//!   mutations) and in-memory backends
//! - **PubSub**: topic fan-out that frames `next` messages per subscriber
//!   and reaps gone connections
//! - **Socket**: the per-invocation view over one connection
//! - **Server**: the protocol state machine dispatching CONNECT, MESSAGE,
//!   and DISCONNECT events
//!
//! # Example
//!
//! ```rust,no_run
//! use graphql_ws_lambda::{SubscriptionServer, WebSocketEvent};
//!
//! async fn handler(
//!     server: &SubscriptionServer,
//!     event: WebSocketEvent,
//! ) -> graphql_ws_lambda::Result<()> {
//!     let response = server.handle(event).await?;
//!     assert_eq!(response.status_code, 200);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod context;
pub mod emitter;
pub mod error;
pub mod event;
pub mod execution;
pub mod gateway;
pub mod hooks;
pub mod protocol;
pub mod pubsub;
pub mod server;
pub mod socket;
pub mod state;

pub use codec::{Channel, KeySpace};
pub use config::{AdapterConfig, StoreBackend, StoreConfig};
pub use context::{ConnectionContext, ContextStore, TrackedContext};
pub use emitter::SubscriptionEmitter;
pub use error::{Error, Result};
pub use event::{GatewayResponse, WebSocketEvent, WebSocketEventType};
pub use execution::{
    ExecutionAdapter, ExecutionResult, GraphqlError, OperationKind, Prepared, PreparedOperation,
    SubscribeOutcome,
};
pub use gateway::{GatewayClient, GatewayError};
pub use hooks::{ConnectDecision, NoopHooks, ServerHooks, SubscribeDecision};
pub use protocol::{
    ClientMessage, CloseCode, JsonCodec, MessageCodec, ServerMessage, SubscribePayload,
};
pub use pubsub::{PubSub, TopicSubscription};
pub use server::{create_server, CustomRouteHandler, SubscriptionServer};
pub use socket::Socket;
pub use state::{create_store, InMemoryStore, PubSubStore, RedisStore};
