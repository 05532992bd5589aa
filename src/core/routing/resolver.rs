//! Provider resolution
//!
//! Maps a model record to a concrete (provider, effective model) pair,
//! recursing through expert routing and smart routing. Chains of virtual
//! models can reference each other, so every step threads an explicit depth
//! counter; exceeding the bound fails before any lookup is performed.
//! Smart-routing resolutions seed the exclusion set with the selected
//! provider so a subsequent retry naturally avoids it.

use super::config::{HashSource, RoutingConfig, RoutingStrategy};
use super::state::RoutingState;
use crate::config::GatewaySettings;
use crate::core::expert::{ExpertRoute, ExpertRouter, RoutingContext};
use crate::core::types::{ModelRecord, Protocol, ProxyRequest, Resolution};
use crate::storage::ConfigStore;
use crate::utils::error::{GatewayError, Result};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Recursive Model → Provider resolver
pub struct ProviderResolver {
    store: Arc<dyn ConfigStore>,
    state: Arc<RoutingState>,
    expert: ExpertRouter,
    settings: GatewaySettings,
}

impl ProviderResolver {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        state: Arc<RoutingState>,
        expert: ExpertRouter,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            store,
            state,
            expert,
            settings,
        }
    }

    /// Shared breaker/affinity state
    pub fn state(&self) -> &RoutingState {
        &self.state
    }

    /// Wall-clock budget for cross-target retries
    pub fn retry_window(&self) -> Duration {
        self.settings.routing.retry_window()
    }

    /// Resolve a model to a provider, starting at depth 0
    pub async fn resolve(
        &self,
        model: &ModelRecord,
        request: &mut ProxyRequest,
        virtual_key_id: Option<&str>,
    ) -> Result<Resolution> {
        self.resolve_at(model, request, virtual_key_id, 0).await
    }

    /// Resolve at an explicit recursion depth.
    ///
    /// Flow: depth guard, then expert routing (when configured), then smart
    /// routing (virtual models), then the plain provider binding.
    pub fn resolve_at<'a>(
        &'a self,
        model: &'a ModelRecord,
        request: &'a mut ProxyRequest,
        virtual_key_id: Option<&'a str>,
        depth: u8,
    ) -> BoxFuture<'a, Result<Resolution>> {
        Box::pin(async move {
            if depth > self.settings.routing.max_resolve_depth {
                error!(
                    model_id = %model.id,
                    depth,
                    "routing depth exceeded, aborting resolution"
                );
                return Err(GatewayError::MaxDepthExceeded { depth });
            }

            if request.protocol.is_none() {
                request.protocol = Some(Protocol::OpenAI);
            }

            if let Some(expert_routing_id) = &model.expert_routing_id {
                let context = RoutingContext {
                    model_id: Some(model.id.clone()),
                    virtual_key_id: virtual_key_id.map(str::to_string),
                };
                match self.expert.route(request, expert_routing_id, &context).await {
                    Ok(route) => {
                        return self.apply_expert_route(route, request, virtual_key_id, depth).await;
                    }
                    // Missing or disabled expert config: no expert routing
                    // applies, continue down the chain
                    Err(GatewayError::ExpertRoutingUnavailable(_)) => {}
                    Err(e) => return Err(e),
                }
            }

            if let Some(resolution) = self
                .resolve_smart_routing(model, request, virtual_key_id, None)
                .await?
            {
                return Ok(resolution);
            }

            let provider_id = model
                .provider_id
                .as_deref()
                .ok_or_else(|| GatewayError::ModelHasNoProvider(model.id.clone()))?;
            let provider = self
                .store
                .provider_by_id(provider_id)
                .await?
                .ok_or_else(|| GatewayError::ProviderNotFound(provider_id.to_string()))?;

            // Plain bindings carry no exclusion set: there is nothing to
            // fail over to
            Ok(Resolution {
                provider,
                provider_id: provider_id.to_string(),
                model_override: None,
                resolved_model: None,
                exclude_providers: None,
            })
        })
    }

    /// Turn an expert decision into a resolution, recursing on virtual
    /// experts so the caller is transparently routed through the whole chain
    async fn apply_expert_route(
        &self,
        route: ExpertRoute,
        request: &mut ProxyRequest,
        virtual_key_id: Option<&str>,
        depth: u8,
    ) -> Result<Resolution> {
        if let Some(expert_model_id) = &route.expert_model_id {
            let virtual_model = self
                .store
                .model_by_id(expert_model_id)
                .await?
                .ok_or_else(|| GatewayError::ModelNotFound(expert_model_id.clone()))?;

            debug!(
                model = %virtual_model.name,
                category = %route.category,
                "expert routing recursing into virtual model"
            );
            return self
                .resolve_at(&virtual_model, request, virtual_key_id, depth + 1)
                .await;
        }

        let provider = route.provider.ok_or_else(|| {
            GatewayError::Config(format!(
                "expert {:?} resolved to a real target without a provider",
                route.expert_name
            ))
        })?;
        let provider_id = provider.id.clone();

        let mut resolved_model = None;
        if let Some(model_override) = &route.model_override {
            request.set_model(model_override);
            resolved_model = self.find_real_model(&provider_id, model_override).await?;
            if resolved_model.is_none() {
                warn!(
                    model_override = %model_override,
                    provider = %provider.name,
                    "expert routing found no real model for override"
                );
            }
        }

        Ok(Resolution {
            provider,
            provider_id,
            model_override: route.model_override,
            resolved_model,
            exclude_providers: None,
        })
    }

    /// Resolve a virtual model through its routing config.
    ///
    /// Returns `Ok(None)` when the model is not smart-routed. `exclude`
    /// carries providers already attempted; the returned resolution's
    /// exclusion set is the input grown by the newly selected provider.
    pub async fn resolve_smart_routing(
        &self,
        model: &ModelRecord,
        request: &mut ProxyRequest,
        virtual_key_id: Option<&str>,
        exclude: Option<&HashSet<String>>,
    ) -> Result<Option<Resolution>> {
        if !model.is_virtual {
            return Ok(None);
        }
        let Some(routing_config_id) = model.routing_config_id.as_deref() else {
            return Ok(None);
        };

        let record = self
            .store
            .routing_config_by_id(routing_config_id)
            .await?
            .ok_or_else(|| {
                error!(routing_config_id, "smart routing config not found");
                GatewayError::Config(format!(
                    "smart routing config not found: {}",
                    routing_config_id
                ))
            })?;
        let config = RoutingConfig::parse(routing_config_id, &record.config)?;

        let hash_key = self.compute_hash_key(&config, request, virtual_key_id);
        let has_targets = !config.targets.is_empty();

        let Some(target) = self.state.select_target(
            &config,
            Some(routing_config_id),
            hash_key.as_deref(),
            exclude,
        ) else {
            if !has_targets {
                error!(routing_config_id, "smart routing config has no targets");
                return Err(GatewayError::NoTargetsConfigured(
                    routing_config_id.to_string(),
                ));
            }
            // Targets exist but every provider is circuit-open or already
            // attempted in this request
            warn!(
                routing_config_id,
                excluded = exclude.map(HashSet::len).unwrap_or(0),
                "smart routing: all targets unavailable"
            );
            return Err(GatewayError::AllTargetsUnavailable(
                routing_config_id.to_string(),
            ));
        };

        let provider = self
            .store
            .provider_by_id(&target.provider)
            .await?
            .ok_or_else(|| GatewayError::ProviderNotFound(target.provider.clone()))?;

        let mut exclude_providers = exclude.cloned().unwrap_or_default();
        exclude_providers.insert(target.provider.clone());

        let mut resolved_model = None;
        let model_override = target.model_override().map(str::to_string);
        if let Some(model_override) = &model_override {
            request.set_model(model_override);
            resolved_model = self.find_real_model(&target.provider, model_override).await?;
            if resolved_model.is_none() {
                warn!(
                    model_override = %model_override,
                    provider = %provider.name,
                    "smart routing found no real model for override"
                );
            }
        }

        info!(
            provider = %provider.name,
            model = model_override.as_deref().unwrap_or("default"),
            routing_config_id,
            "smart routing target selected"
        );

        Ok(Some(Resolution {
            provider,
            provider_id: target.provider.clone(),
            model_override,
            resolved_model,
            exclude_providers: Some(exclude_providers),
        }))
    }

    /// Re-resolve for a retry with a grown exclusion set (smart routing
    /// only; expert routing is not re-entered on retries)
    pub async fn resolve_retry(
        &self,
        model_id: &str,
        request: &mut ProxyRequest,
        virtual_key_id: Option<&str>,
        exclude: &HashSet<String>,
    ) -> Result<Resolution> {
        let model = self
            .store
            .model_by_id(model_id)
            .await?
            .ok_or_else(|| GatewayError::ModelNotFound(model_id.to_string()))?;

        self.resolve_smart_routing(&model, request, virtual_key_id, Some(exclude))
            .await?
            .ok_or_else(|| {
                GatewayError::Config(format!("model is not smart-routed: {}", model_id))
            })
    }

    /// Hash key for hash-mode configs: the virtual key id, or the serialized
    /// request body
    fn compute_hash_key(
        &self,
        config: &RoutingConfig,
        request: &ProxyRequest,
        virtual_key_id: Option<&str>,
    ) -> Option<String> {
        match &config.strategy {
            RoutingStrategy::Hash { hash_source } => match hash_source {
                HashSource::VirtualKey => virtual_key_id.map(str::to_string),
                HashSource::Request => Some(request.body.to_string()),
            },
            _ => None,
        }
    }

    /// Find a provider's real model matching an override identifier, to
    /// recover protocol and attribute metadata
    async fn find_real_model(
        &self,
        provider_id: &str,
        model_override: &str,
    ) -> Result<Option<ModelRecord>> {
        let models = self.store.models_by_provider(provider_id).await?;
        Ok(models
            .into_iter()
            .find(|m| !m.is_virtual && m.matches_name(model_override)))
    }
}
