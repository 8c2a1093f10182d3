//! The persistence seam consumed by the protocol core
//!
//! One trait covers the three concerns the adapter externalizes: the
//! topic/subscription/connection triple-index, the per-connection context
//! hash, and the verbatim subscribe payload records. The three multi-key
//! registry mutations are atomic in every backend: Lua scripts on Redis,
//! one lock acquisition in memory.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::codec::keys::Channel;
use crate::error::Result;

/// Storage operations backing the registry, context store, and publisher
#[async_trait]
pub trait PubSubStore: Send + Sync {
    /// Record a subscription on every given topic. Atomic and idempotent:
    /// registering the same triple twice yields exactly one channel member
    /// per topic.
    async fn register(
        &self,
        connection_id: &str,
        subscription_id: &str,
        topics: &[String],
    ) -> Result<()>;

    /// Remove one subscription from every topic it references and from its
    /// connection's owned set. Atomic; tolerates "already removed".
    async fn unregister(&self, connection_id: &str, subscription_id: &str) -> Result<()>;

    /// Remove every subscription owned by a connection, then the connection
    /// itself. Atomic; tolerates "already removed".
    async fn disconnect(&self, connection_id: &str) -> Result<()>;

    /// All channels currently subscribed to a topic. Takes no lock; callers
    /// tolerate concurrent mutation. Malformed members are dropped.
    async fn channels(&self, topic: &str) -> Result<Vec<Channel>>;

    /// Topic names a subscription is registered on
    async fn registered_topics(&self, subscription_id: &str) -> Result<Vec<String>>;

    /// Subscription ids owned by a connection
    async fn connection_subscriptions(&self, connection_id: &str) -> Result<Vec<String>>;

    /// Whether a subscription id is currently registered
    async fn is_registered(&self, subscription_id: &str) -> Result<bool>;

    /// Replace a connection's context record with the given fields
    async fn put_context(&self, connection_id: &str, fields: Vec<(String, String)>) -> Result<()>;

    /// Read a connection's context record; empty when absent
    async fn read_context(&self, connection_id: &str) -> Result<HashMap<String, String>>;

    /// Write individual context fields
    async fn set_context_fields(
        &self,
        connection_id: &str,
        fields: &[(String, String)],
    ) -> Result<()>;

    /// Delete individual context fields
    async fn remove_context_fields(&self, connection_id: &str, fields: &[String]) -> Result<()>;

    /// Delete a connection's context record
    async fn delete_context(&self, connection_id: &str) -> Result<()>;

    /// Store the verbatim subscribe payload for a subscription
    async fn save_subscription(&self, subscription_id: &str, payload: &str) -> Result<()>;

    /// Load the verbatim subscribe payload for a subscription
    async fn load_subscription(&self, subscription_id: &str) -> Result<Option<String>>;

    /// Delete the subscribe payload record for a subscription
    async fn delete_subscription(&self, subscription_id: &str) -> Result<()>;
}
