use std::sync::Arc;

use crate::config::{AdapterConfig, StoreBackend};
use crate::error::{Error, Result};
use crate::state::memory_store::InMemoryStore;
use crate::state::redis_store::RedisStore;
use crate::state::store::PubSubStore;

/// Create a store from the adapter configuration
pub async fn create_store(config: &AdapterConfig) -> Result<Arc<dyn PubSubStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory pub/sub store");
            Ok(Arc::new(InMemoryStore::new(config.key_space())))
        }
        StoreBackend::Redis => {
            let redis_url = config.store.redis_url.as_deref().ok_or_else(|| {
                Error::Configuration(
                    "Redis backend selected but store.redis_url is not set".to_string(),
                )
            })?;
            let store = RedisStore::new(redis_url, config.key_space()).await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_is_default() {
        let store = create_store(&AdapterConfig::default()).await.unwrap();
        assert!(store.channels("any").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redis_backend_requires_url() {
        let config = AdapterConfig {
            store: crate::config::StoreConfig {
                backend: StoreBackend::Redis,
                redis_url: None,
            },
            ..Default::default()
        };

        let err = create_store(&config).await.err().expect("should fail");
        assert!(matches!(err, Error::Configuration(_)));
    }
}
