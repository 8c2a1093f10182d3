//! Distributed pub/sub fan-out
//!
//! Subscription resolvers return a [`TopicSubscription`] naming the topics
//! they want to hear; the protocol machine records the registration in the
//! store. Publishing walks the topic's subscriber set and pushes one framed
//! `next` message per channel through the gateway.

pub mod channel;
pub mod publisher;

pub use channel::TopicSubscription;
pub use publisher::{DeliveryMode, PubSub};
