//! The registrable channel returned by subscription resolvers

/// A subscription resolver's request to hear one or more topics
///
/// This is the counterpart of an event stream in a long-lived server: no
/// iterator is produced, only the set of topics whose future publishes
/// should be routed to the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSubscription {
    topics: Vec<String>,
}

impl TopicSubscription {
    pub fn new(topics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// Subscribe to a single topic
    pub fn single(topic: impl Into<String>) -> Self {
        Self::new([topic.into()])
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }
}
