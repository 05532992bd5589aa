//! In-memory config store
//!
//! Backs tests and single-process embedders that load configuration up
//! front. Lookups clone records out of concurrent maps, matching the
//! read-only contract of [`ConfigStore`].

use super::{ConfigStore, ExpertRoutingConfigRecord, RoutingConfigRecord, StoreResult};
use crate::core::types::{ModelRecord, ProviderRecord};
use async_trait::async_trait;
use dashmap::DashMap;

/// Concurrent in-memory implementation of [`ConfigStore`]
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    providers: DashMap<String, ProviderRecord>,
    models: DashMap<String, ModelRecord>,
    routing_configs: DashMap<String, RoutingConfigRecord>,
    expert_routing_configs: DashMap<String, ExpertRoutingConfigRecord>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_provider(&self, provider: ProviderRecord) {
        self.providers.insert(provider.id.clone(), provider);
    }

    pub fn insert_model(&self, model: ModelRecord) {
        self.models.insert(model.id.clone(), model);
    }

    pub fn insert_routing_config(&self, record: RoutingConfigRecord) {
        self.routing_configs.insert(record.id.clone(), record);
    }

    pub fn insert_expert_routing_config(&self, record: ExpertRoutingConfigRecord) {
        self.expert_routing_configs.insert(record.id.clone(), record);
    }

    pub fn remove_provider(&self, id: &str) -> Option<ProviderRecord> {
        self.providers.remove(id).map(|(_, v)| v)
    }

    pub fn remove_model(&self, id: &str) -> Option<ModelRecord> {
        self.models.remove(id).map(|(_, v)| v)
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn provider_by_id(&self, id: &str) -> StoreResult<Option<ProviderRecord>> {
        Ok(self.providers.get(id).map(|r| r.clone()))
    }

    async fn model_by_id(&self, id: &str) -> StoreResult<Option<ModelRecord>> {
        Ok(self.models.get(id).map(|r| r.clone()))
    }

    async fn models_by_provider(&self, provider_id: &str) -> StoreResult<Vec<ModelRecord>> {
        Ok(self
            .models
            .iter()
            .filter(|entry| entry.value().provider_id.as_deref() == Some(provider_id))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn routing_config_by_id(&self, id: &str) -> StoreResult<Option<RoutingConfigRecord>> {
        Ok(self.routing_configs.get(id).map(|r| r.clone()))
    }

    async fn expert_routing_config_by_id(
        &self,
        id: &str,
    ) -> StoreResult<Option<ExpertRoutingConfigRecord>> {
        Ok(self.expert_routing_configs.get(id).map(|r| r.clone()))
    }
}
