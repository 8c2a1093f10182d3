pub mod factory;
pub mod memory_store;
pub mod redis_store;
pub mod store;

pub use factory::create_store;
pub use memory_store::InMemoryStore;
pub use redis_store::RedisStore;
pub use store::PubSubStore;

pub use crate::codec::keys::Channel;
