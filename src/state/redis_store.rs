use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use crate::codec::keys::{Channel, KeySpace};
use crate::error::{Error, Result};
use crate::state::store::PubSubStore;

/// Registers a subscription: adds it to its connection's owned set, the
/// channel member to every topic set, and every topic key to the
/// subscription's set. KEYS[1] = connection set, KEYS[2] = subscription
/// set, KEYS[3..] = topic sets; ARGV[1] = channel member.
const REGISTER_SCRIPT: &str = r#"
redis.call('SADD', KEYS[1], KEYS[2])
for i = 3, #KEYS do
  redis.call('SADD', KEYS[i], ARGV[1])
  redis.call('SADD', KEYS[2], KEYS[i])
end
return #KEYS - 2
"#;

/// Unregisters a subscription: removes the channel member from every topic
/// listed in the subscription's set, removes the subscription from its
/// connection, and deletes the subscription set. KEYS[1] = connection set,
/// KEYS[2] = subscription set; ARGV[1] = channel member.
const UNREGISTER_SCRIPT: &str = r#"
local topics = redis.call('SMEMBERS', KEYS[2])
for _, topic in ipairs(topics) do
  redis.call('SREM', topic, ARGV[1])
end
redis.call('SREM', KEYS[1], KEYS[2])
redis.call('DEL', KEYS[2])
return #topics
"#;

/// Tears down a connection: for every owned subscription, removes its
/// channel member from every referenced topic and deletes the subscription
/// set, then deletes the connection set. Members of the connection set are
/// full subscription keys, so the script derives everything it needs.
/// KEYS[1] = connection set.
const DISCONNECT_SCRIPT: &str = r#"
local subs = redis.call('SMEMBERS', KEYS[1])
for _, sub in ipairs(subs) do
  local member = KEYS[1] .. '#' .. sub
  local topics = redis.call('SMEMBERS', sub)
  for _, topic in ipairs(topics) do
    redis.call('SREM', topic, member)
  end
  redis.call('DEL', sub)
end
redis.call('DEL', KEYS[1])
return #subs
"#;

/// Redis-backed store
///
/// Multi-key registry mutations run as single server-side scripts so they
/// are atomic under concurrent invocations; everything else is single-key.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    keys: KeySpace,
    register_script: Script,
    unregister_script: Script,
    disconnect_script: Script,
}

impl RedisStore {
    /// Create a new Redis store
    pub async fn new(redis_url: &str, keys: KeySpace) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| Error::Storage(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Storage(format!("Failed to connect to Redis: {}", e)))?;

        // Probe the connection before accepting traffic
        let mut probe = connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut probe)
            .await
            .map_err(|e| Error::Storage(format!("Redis connection test failed: {}", e)))?;

        tracing::info!("Initialized Redis pub/sub store");

        Ok(Self {
            connection,
            keys,
            register_script: Script::new(REGISTER_SCRIPT),
            unregister_script: Script::new(UNREGISTER_SCRIPT),
            disconnect_script: Script::new(DISCONNECT_SCRIPT),
        })
    }
}

#[async_trait]
impl PubSubStore for RedisStore {
    async fn register(
        &self,
        connection_id: &str,
        subscription_id: &str,
        topics: &[String],
    ) -> Result<()> {
        let mut conn = self.connection.clone();

        let mut invocation = self.register_script.prepare_invoke();
        invocation
            .key(self.keys.connection(connection_id))
            .key(self.keys.subscription(subscription_id));
        for topic in topics {
            invocation.key(self.keys.topic(topic));
        }
        invocation.arg(self.keys.channel_member(connection_id, subscription_id));

        let registered: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::Storage(format!("Failed to register subscription: {}", e)))?;

        tracing::debug!(
            connection_id = %connection_id,
            subscription_id = %subscription_id,
            topics = registered,
            "Subscription registered"
        );
        Ok(())
    }

    async fn unregister(&self, connection_id: &str, subscription_id: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let mut invocation = self.unregister_script.prepare_invoke();
        invocation
            .key(self.keys.connection(connection_id))
            .key(self.keys.subscription(subscription_id))
            .arg(self.keys.channel_member(connection_id, subscription_id));

        let _: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::Storage(format!("Failed to unregister subscription: {}", e)))?;

        tracing::debug!(
            connection_id = %connection_id,
            subscription_id = %subscription_id,
            "Subscription unregistered"
        );
        Ok(())
    }

    async fn disconnect(&self, connection_id: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let mut invocation = self.disconnect_script.prepare_invoke();
        invocation.key(self.keys.connection(connection_id));

        let removed: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::Storage(format!("Failed to disconnect connection: {}", e)))?;

        tracing::debug!(
            connection_id = %connection_id,
            subscriptions = removed,
            "Connection removed from registry"
        );
        Ok(())
    }

    async fn channels(&self, topic: &str) -> Result<Vec<Channel>> {
        let mut conn = self.connection.clone();

        let members: Vec<String> = conn
            .smembers(self.keys.topic(topic))
            .await
            .map_err(|e| Error::Storage(format!("Failed to read topic subscribers: {}", e)))?;

        Ok(members
            .iter()
            .filter_map(|member| {
                let channel = self.keys.parse_channel(member);
                if channel.is_none() {
                    tracing::debug!(member = %member, "Dropping malformed channel member");
                }
                channel
            })
            .collect())
    }

    async fn registered_topics(&self, subscription_id: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();

        let members: Vec<String> = conn
            .smembers(self.keys.subscription(subscription_id))
            .await
            .map_err(|e| Error::Storage(format!("Failed to read subscription topics: {}", e)))?;

        Ok(members
            .iter()
            .filter_map(|member| self.keys.topic_name(member))
            .collect())
    }

    async fn connection_subscriptions(&self, connection_id: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();

        let members: Vec<String> = conn
            .smembers(self.keys.connection(connection_id))
            .await
            .map_err(|e| {
                Error::Storage(format!("Failed to read connection subscriptions: {}", e))
            })?;

        Ok(members
            .iter()
            .filter_map(|member| self.keys.subscription_id(member))
            .collect())
    }

    async fn is_registered(&self, subscription_id: &str) -> Result<bool> {
        let mut conn = self.connection.clone();

        conn.exists(self.keys.subscription(subscription_id))
            .await
            .map_err(|e| Error::Storage(format!("Failed to check subscription: {}", e)))
    }

    async fn put_context(&self, connection_id: &str, fields: Vec<(String, String)>) -> Result<()> {
        let key = self.keys.context(connection_id);
        let mut conn = self.connection.clone();

        // Replace the whole record in one round trip
        let mut pipe = redis::pipe();
        pipe.atomic().del(&key);
        if !fields.is_empty() {
            pipe.hset_multiple(&key, &fields);
        }
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create context record: {}", e)))?;

        Ok(())
    }

    async fn read_context(&self, connection_id: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection.clone();

        conn.hgetall(self.keys.context(connection_id))
            .await
            .map_err(|e| Error::Storage(format!("Failed to read context record: {}", e)))
    }

    async fn set_context_fields(
        &self,
        connection_id: &str,
        fields: &[(String, String)],
    ) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();

        let _: () = conn
            .hset_multiple(self.keys.context(connection_id), fields)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write context fields: {}", e)))?;

        Ok(())
    }

    async fn remove_context_fields(&self, connection_id: &str, fields: &[String]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();

        let _: () = conn
            .hdel(self.keys.context(connection_id), fields.to_vec())
            .await
            .map_err(|e| Error::Storage(format!("Failed to delete context fields: {}", e)))?;

        Ok(())
    }

    async fn delete_context(&self, connection_id: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .del(self.keys.context(connection_id))
            .await
            .map_err(|e| Error::Storage(format!("Failed to delete context record: {}", e)))?;

        Ok(())
    }

    async fn save_subscription(&self, subscription_id: &str, payload: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .set(self.keys.subscription_record(subscription_id), payload)
            .await
            .map_err(|e| Error::Storage(format!("Failed to save subscribe payload: {}", e)))?;

        Ok(())
    }

    async fn load_subscription(&self, subscription_id: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();

        conn.get(self.keys.subscription_record(subscription_id))
            .await
            .map_err(|e| Error::Storage(format!("Failed to load subscribe payload: {}", e)))
    }

    async fn delete_subscription(&self, subscription_id: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .del(self.keys.subscription_record(subscription_id))
            .await
            .map_err(|e| Error::Storage(format!("Failed to delete subscribe payload: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to check if Redis is available
    async fn redis_available() -> bool {
        match Client::open("redis://127.0.0.1:6379/15") {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(mut conn) => {
                    redis::cmd("PING")
                        .query_async::<_, String>(&mut conn)
                        .await
                        .is_ok()
                }
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    async fn create_test_store(prefix: &str) -> Option<RedisStore> {
        if !redis_available().await {
            return None;
        }

        RedisStore::new(
            "redis://127.0.0.1:6379/15",
            KeySpace::new(prefix, format!("{prefix}-state")),
        )
        .await
        .ok()
    }

    #[tokio::test]
    async fn test_register_and_channels() {
        let Some(store) = create_test_store("t-register").await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        store
            .register("c1", "s1", &["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();

        let channels = store.channels("alpha").await.unwrap();
        assert_eq!(channels, vec![Channel::new("c1", "s1")]);

        let topics = store.registered_topics("s1").await.unwrap();
        assert_eq!(topics.len(), 2);
        assert!(store.is_registered("s1").await.unwrap());

        // Cleanup
        store.disconnect("c1").await.unwrap();
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let Some(store) = create_test_store("t-idem").await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        for _ in 0..3 {
            store
                .register("c1", "s1", &["alpha".to_string()])
                .await
                .unwrap();
        }

        let channels = store.channels("alpha").await.unwrap();
        assert_eq!(channels.len(), 1);

        // Cleanup
        store.disconnect("c1").await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_removes_everything() {
        let Some(store) = create_test_store("t-disc").await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        store
            .register("c1", "s1", &["t1".to_string(), "t2".to_string()])
            .await
            .unwrap();
        store.register("c1", "s2", &["t2".to_string()]).await.unwrap();

        store.disconnect("c1").await.unwrap();

        assert!(store.channels("t1").await.unwrap().is_empty());
        assert!(store.channels("t2").await.unwrap().is_empty());
        assert!(!store.is_registered("s1").await.unwrap());
        assert!(!store.is_registered("s2").await.unwrap());
        assert!(store.connection_subscriptions("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_record_lifecycle() {
        let Some(store) = create_test_store("t-ctx").await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        store
            .put_context(
                "c1",
                vec![("acknowledged".to_string(), "__boolean__true".to_string())],
            )
            .await
            .unwrap();

        store
            .set_context_fields(
                "c1",
                &[("extra.count".to_string(), "__number__1".to_string())],
            )
            .await
            .unwrap();

        let fields = store.read_context("c1").await.unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["acknowledged"], "__boolean__true");

        store
            .remove_context_fields("c1", &["extra.count".to_string()])
            .await
            .unwrap();
        let fields = store.read_context("c1").await.unwrap();
        assert_eq!(fields.len(), 1);

        store.delete_context("c1").await.unwrap();
        assert!(store.read_context("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_record_lifecycle() {
        let Some(store) = create_test_store("t-payload").await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        store
            .save_subscription("s1", r#"{"query":"subscription { messaged }"}"#)
            .await
            .unwrap();
        let loaded = store.load_subscription("s1").await.unwrap();
        assert!(loaded.unwrap().contains("messaged"));

        store.delete_subscription("s1").await.unwrap();
        assert!(store.load_subscription("s1").await.unwrap().is_none());
    }
}
