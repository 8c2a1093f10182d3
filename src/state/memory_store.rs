use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::codec::keys::{Channel, KeySpace};
use crate::error::Result;
use crate::state::store::PubSubStore;

/// In-memory store (for local development and testing)
///
/// Mirrors the Redis layout key for key: the triple-index maps are keyed by
/// full namespaced keys and hold the same members the Redis sets would.
/// Each registry mutation runs under one write lock, which makes it atomic
/// exactly the way the Lua scripts are.
pub struct InMemoryStore {
    keys: KeySpace,
    index: RwLock<RegistryIndex>,
    contexts: DashMap<String, HashMap<String, String>>,
    subscriptions: DashMap<String, String>,
}

#[derive(Default)]
struct RegistryIndex {
    /// connection key -> owned subscription keys
    connections: HashMap<String, BTreeSet<String>>,
    /// subscription key -> referenced topic keys
    topics_by_subscription: HashMap<String, BTreeSet<String>>,
    /// topic key -> channel members
    subscribers: HashMap<String, BTreeSet<String>>,
}

impl RegistryIndex {
    /// Drop a member from a topic set, removing the set once empty the way
    /// Redis drops empty sets.
    fn remove_subscriber(&mut self, topic_key: &str, member: &str) {
        let now_empty = match self.subscribers.get_mut(topic_key) {
            Some(members) => {
                members.remove(member);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.subscribers.remove(topic_key);
        }
    }
}

impl InMemoryStore {
    pub fn new(keys: KeySpace) -> Self {
        Self {
            keys,
            index: RwLock::new(RegistryIndex::default()),
            contexts: DashMap::new(),
            subscriptions: DashMap::new(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(KeySpace::default())
    }
}

#[async_trait]
impl PubSubStore for InMemoryStore {
    async fn register(
        &self,
        connection_id: &str,
        subscription_id: &str,
        topics: &[String],
    ) -> Result<()> {
        let connection_key = self.keys.connection(connection_id);
        let subscription_key = self.keys.subscription(subscription_id);
        let member = self.keys.channel_member(connection_id, subscription_id);

        let mut index = self.index.write();
        index
            .connections
            .entry(connection_key)
            .or_default()
            .insert(subscription_key.clone());
        for topic in topics {
            let topic_key = self.keys.topic(topic);
            index
                .subscribers
                .entry(topic_key.clone())
                .or_default()
                .insert(member.clone());
            index
                .topics_by_subscription
                .entry(subscription_key.clone())
                .or_default()
                .insert(topic_key);
        }

        tracing::debug!(
            connection_id = %connection_id,
            subscription_id = %subscription_id,
            topics = topics.len(),
            "Subscription registered"
        );
        Ok(())
    }

    async fn unregister(&self, connection_id: &str, subscription_id: &str) -> Result<()> {
        let connection_key = self.keys.connection(connection_id);
        let subscription_key = self.keys.subscription(subscription_id);
        let member = self.keys.channel_member(connection_id, subscription_id);

        let mut index = self.index.write();
        if let Some(topic_keys) = index.topics_by_subscription.remove(&subscription_key) {
            for topic_key in topic_keys {
                index.remove_subscriber(&topic_key, &member);
            }
        }
        let now_empty = match index.connections.get_mut(&connection_key) {
            Some(owned) => {
                owned.remove(&subscription_key);
                owned.is_empty()
            }
            None => false,
        };
        if now_empty {
            index.connections.remove(&connection_key);
        }

        Ok(())
    }

    async fn disconnect(&self, connection_id: &str) -> Result<()> {
        let connection_key = self.keys.connection(connection_id);

        let mut index = self.index.write();
        let owned = index.connections.remove(&connection_key).unwrap_or_default();
        for subscription_key in owned {
            let member = format!("{connection_key}#{subscription_key}");
            if let Some(topic_keys) = index.topics_by_subscription.remove(&subscription_key) {
                for topic_key in topic_keys {
                    index.remove_subscriber(&topic_key, &member);
                }
            }
        }

        tracing::debug!(connection_id = %connection_id, "Connection removed from registry");
        Ok(())
    }

    async fn channels(&self, topic: &str) -> Result<Vec<Channel>> {
        let topic_key = self.keys.topic(topic);

        let index = self.index.read();
        Ok(index
            .subscribers
            .get(&topic_key)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|member| self.keys.parse_channel(member))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn registered_topics(&self, subscription_id: &str) -> Result<Vec<String>> {
        let subscription_key = self.keys.subscription(subscription_id);

        let index = self.index.read();
        Ok(index
            .topics_by_subscription
            .get(&subscription_key)
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(|topic_key| self.keys.topic_name(topic_key))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn connection_subscriptions(&self, connection_id: &str) -> Result<Vec<String>> {
        let connection_key = self.keys.connection(connection_id);

        let index = self.index.read();
        Ok(index
            .connections
            .get(&connection_key)
            .map(|owned| {
                owned
                    .iter()
                    .filter_map(|subscription_key| self.keys.subscription_id(subscription_key))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn is_registered(&self, subscription_id: &str) -> Result<bool> {
        let subscription_key = self.keys.subscription(subscription_id);
        Ok(self
            .index
            .read()
            .topics_by_subscription
            .contains_key(&subscription_key))
    }

    async fn put_context(&self, connection_id: &str, fields: Vec<(String, String)>) -> Result<()> {
        let key = self.keys.context(connection_id);
        if fields.is_empty() {
            self.contexts.remove(&key);
        } else {
            self.contexts.insert(key, fields.into_iter().collect());
        }
        Ok(())
    }

    async fn read_context(&self, connection_id: &str) -> Result<HashMap<String, String>> {
        let key = self.keys.context(connection_id);
        Ok(self
            .contexts
            .get(&key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn set_context_fields(
        &self,
        connection_id: &str,
        fields: &[(String, String)],
    ) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let key = self.keys.context(connection_id);
        self.contexts
            .entry(key)
            .or_default()
            .extend(fields.iter().cloned());
        Ok(())
    }

    async fn remove_context_fields(&self, connection_id: &str, fields: &[String]) -> Result<()> {
        let key = self.keys.context(connection_id);
        let now_empty = match self.contexts.get_mut(&key) {
            Some(mut entry) => {
                for field in fields {
                    entry.remove(field);
                }
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.contexts.remove(&key);
        }
        Ok(())
    }

    async fn delete_context(&self, connection_id: &str) -> Result<()> {
        self.contexts.remove(&self.keys.context(connection_id));
        Ok(())
    }

    async fn save_subscription(&self, subscription_id: &str, payload: &str) -> Result<()> {
        self.subscriptions.insert(
            self.keys.subscription_record(subscription_id),
            payload.to_string(),
        );
        Ok(())
    }

    async fn load_subscription(&self, subscription_id: &str) -> Result<Option<String>> {
        Ok(self
            .subscriptions
            .get(&self.keys.subscription_record(subscription_id))
            .map(|entry| entry.value().clone()))
    }

    async fn delete_subscription(&self, subscription_id: &str) -> Result<()> {
        self.subscriptions
            .remove(&self.keys.subscription_record(subscription_id));
        Ok(())
    }
}
