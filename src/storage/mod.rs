//! Configuration store abstraction
//!
//! The routing core never owns configuration records; it reads them through
//! [`ConfigStore`]. Routing and expert-routing configs are stored as
//! serialized JSON blobs and deserialized into typed structures at the
//! resolution boundary (see `core::routing::config` and
//! `core::expert::config`).

pub mod memory;

use crate::core::types::{ModelRecord, ProviderRecord};
use async_trait::async_trait;

pub use memory::MemoryConfigStore;

/// Storage-layer failure, opaque to the routing core
#[derive(Debug, thiserror::Error)]
#[error("config store error: {0}")]
pub struct StoreError(pub anyhow::Error);

impl From<anyhow::Error> for StoreError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Smart-routing config row: id plus the serialized strategy/targets blob
#[derive(Debug, Clone)]
pub struct RoutingConfigRecord {
    pub id: String,
    pub name: String,
    /// Serialized `RoutingConfig` JSON
    pub config: String,
}

/// Expert-routing config row
#[derive(Debug, Clone)]
pub struct ExpertRoutingConfigRecord {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// Serialized `ExpertRoutingConfig` JSON
    pub config: String,
}

/// Read-only configuration lookups used during a resolution
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn provider_by_id(&self, id: &str) -> StoreResult<Option<ProviderRecord>>;

    async fn model_by_id(&self, id: &str) -> StoreResult<Option<ModelRecord>>;

    /// All models bound directly to a provider (used to recover protocol and
    /// attribute metadata for override identifiers)
    async fn models_by_provider(&self, provider_id: &str) -> StoreResult<Vec<ModelRecord>>;

    async fn routing_config_by_id(&self, id: &str) -> StoreResult<Option<RoutingConfigRecord>>;

    async fn expert_routing_config_by_id(
        &self,
        id: &str,
    ) -> StoreResult<Option<ExpertRoutingConfigRecord>>;
}
