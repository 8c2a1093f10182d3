//! Namespaced key construction and channel tuples

use serde::{Deserialize, Serialize};

/// Delivery address of one subscription: the pair recorded on a topic's
/// subscriber set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub connection_id: String,
    pub subscription_id: String,
}

impl Channel {
    pub fn new(connection_id: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            subscription_id: subscription_id.into(),
        }
    }
}

/// Key layout shared by all store backends
///
/// Three fan-out namespaces live under `prefix` (`conn`, `sub`, `topic`);
/// protocol state records live under `state_prefix` (`connection`,
/// `subscription`). The namespaces themselves are fixed.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
    state_prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>, state_prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            state_prefix: state_prefix.into(),
        }
    }

    /// Set of subscription keys owned by a connection
    pub fn connection(&self, connection_id: &str) -> String {
        format!("{}:conn:{}", self.prefix, connection_id)
    }

    /// Set of topic keys a subscription references
    pub fn subscription(&self, subscription_id: &str) -> String {
        format!("{}:sub:{}", self.prefix, subscription_id)
    }

    /// Set of channel members subscribed to a topic
    pub fn topic(&self, name: &str) -> String {
        format!("{}:topic:{}", self.prefix, name)
    }

    /// Hash of flattened context fields for a connection
    pub fn context(&self, connection_id: &str) -> String {
        format!("{}:connection:{}", self.state_prefix, connection_id)
    }

    /// Verbatim subscribe payload for a subscription
    pub fn subscription_record(&self, subscription_id: &str) -> String {
        format!("{}:subscription:{}", self.state_prefix, subscription_id)
    }

    /// Member stored on a topic set: the two full keys joined by `#`, so
    /// both ids are recoverable from one string.
    pub fn channel_member(&self, connection_id: &str, subscription_id: &str) -> String {
        format!(
            "{}#{}",
            self.connection(connection_id),
            self.subscription(subscription_id)
        )
    }

    /// Recover both ids from a topic set member. Malformed members yield
    /// `None` and are dropped by callers.
    pub fn parse_channel(&self, member: &str) -> Option<Channel> {
        let (connection_key, subscription_key) = member.split_once('#')?;
        let connection_id = tail_segment(connection_key)?;
        let subscription_id = tail_segment(subscription_key)?;
        Some(Channel::new(connection_id, subscription_id))
    }

    /// Strip the topic namespace off a full topic key
    pub fn topic_name(&self, topic_key: &str) -> Option<String> {
        topic_key
            .strip_prefix(&format!("{}:topic:", self.prefix))
            .map(str::to_string)
    }

    /// Strip the subscription namespace off a full subscription key
    pub fn subscription_id(&self, subscription_key: &str) -> Option<String> {
        subscription_key
            .strip_prefix(&format!("{}:sub:", self.prefix))
            .map(str::to_string)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("pubsub", "graphql")
    }
}

fn tail_segment(key: &str) -> Option<&str> {
    key.rsplit_once(':')
        .map(|(_, tail)| tail)
        .filter(|tail| !tail.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = KeySpace::default();
        assert_eq!(keys.connection("c1"), "pubsub:conn:c1");
        assert_eq!(keys.subscription("s1"), "pubsub:sub:s1");
        assert_eq!(keys.topic("messaged"), "pubsub:topic:messaged");
        assert_eq!(keys.context("c1"), "graphql:connection:c1");
        assert_eq!(keys.subscription_record("s1"), "graphql:subscription:s1");
    }

    #[test]
    fn test_channel_member_round_trip() {
        let keys = KeySpace::default();
        let member = keys.channel_member("c1", "s1");
        assert_eq!(member, "pubsub:conn:c1#pubsub:sub:s1");

        let channel = keys.parse_channel(&member).unwrap();
        assert_eq!(channel, Channel::new("c1", "s1"));
    }

    #[test]
    fn test_parse_channel_with_custom_prefix() {
        let keys = KeySpace::new("fanout", "graphql");
        let member = keys.channel_member("A", "s-1");
        assert_eq!(keys.parse_channel(&member), Some(Channel::new("A", "s-1")));
    }

    #[test]
    fn test_parse_channel_rejects_malformed() {
        let keys = KeySpace::default();
        assert_eq!(keys.parse_channel(""), None);
        assert_eq!(keys.parse_channel("no-separator"), None);
        assert_eq!(keys.parse_channel("pubsub:conn:c1"), None);
        assert_eq!(keys.parse_channel("pubsub:conn:#pubsub:sub:s1"), None);
        assert_eq!(keys.parse_channel("pubsub:conn:c1#pubsub:sub:"), None);
    }

    #[test]
    fn test_prefix_stripping() {
        let keys = KeySpace::default();
        assert_eq!(
            keys.topic_name("pubsub:topic:room:42"),
            Some("room:42".to_string())
        );
        assert_eq!(keys.topic_name("other:topic:x"), None);
        assert_eq!(keys.subscription_id("pubsub:sub:s9"), Some("s9".to_string()));
    }
}
