use serde::{Deserialize, Serialize};

use crate::codec::keys::KeySpace;
use crate::error::Result;

/// Adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Key prefix for the pub/sub namespaces (`conn`, `sub`, `topic`)
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Key prefix for protocol state records (contexts, subscribe payloads)
    #[serde(default = "default_state_prefix")]
    pub state_prefix: String,

    /// Store backend configuration
    #[serde(default)]
    pub store: StoreConfig,
}

impl AdapterConfig {
    /// Load configuration from the environment (prefix: GRAPHQL_WS__)
    /// layered over the built-in defaults.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("key_prefix", default_key_prefix())?
            .set_default("state_prefix", default_state_prefix())?
            .set_default("store.backend", "memory")?
            .add_source(
                config::Environment::with_prefix("GRAPHQL_WS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// The key layout implied by the configured prefixes
    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(&self.key_prefix, &self.state_prefix)
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            state_prefix: default_state_prefix(),
            store: StoreConfig::default(),
        }
    }
}

/// Store backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend type
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection string (required for the redis backend)
    pub redis_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

// Default value functions
fn default_key_prefix() -> String {
    "pubsub".to_string()
}

fn default_state_prefix() -> String {
    "graphql".to_string()
}
