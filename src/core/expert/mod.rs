//! Expert routing
//!
//! Content-classification-based selection among semantically distinct
//! "expert" targets. A classifier model assigns the request a category; the
//! category maps onto an expert, which is either a real (provider, model)
//! pair or another virtual model the resolver recurses on. Classification
//! failures and unmatched categories degrade to the configured fallback
//! target — the engine's only tolerance for classifier trouble — and every
//! decision is reported to the decision log best-effort.

pub mod config;
pub mod judge;
pub mod preprocess;
pub mod resolve;

use crate::config::ClassifierSettings;
use crate::core::routing::state::RoutingState;
use crate::core::types::{ProviderRecord, ProxyRequest};
use crate::services::classifier::Classifier;
use crate::services::decision_log::{
    DecisionLogger, RoutingDecisionRecord, log_decision_best_effort,
};
use crate::storage::ConfigStore;
use crate::utils::error::{GatewayError, Result};
use chrono::Utc;
use config::{ExpertRoutingConfig, TargetBinding};
use resolve::{ResolvedBinding, match_expert, resolve_binding, resolve_classifier_model};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Caller context threaded into the decision log
#[derive(Debug, Clone, Default)]
pub struct RoutingContext {
    pub model_id: Option<String>,
    pub virtual_key_id: Option<String>,
}

/// Outcome of one expert-routing decision
#[derive(Debug, Clone)]
pub struct ExpertRoute {
    /// Classified category ("fallback" when classification failed)
    pub category: String,
    pub expert_id: String,
    /// "virtual" or "real"
    pub expert_kind: String,
    pub expert_name: String,
    /// Present for real experts
    pub provider: Option<ProviderRecord>,
    pub provider_id: Option<String>,
    pub model_override: Option<String>,
    /// Present for virtual experts; the resolver recurses on this model
    pub expert_model_id: Option<String>,
    pub classification_ms: u64,
}

impl ExpertRoute {
    fn from_binding(resolved: ResolvedBinding, category: String, expert_id: String, elapsed_ms: u64) -> Self {
        let expert_kind = if resolved.expert_model_id.is_some() {
            "virtual"
        } else {
            "real"
        };
        Self {
            category,
            expert_id,
            expert_kind: expert_kind.to_string(),
            expert_name: resolved.expert_name,
            provider: resolved.provider,
            provider_id: resolved.provider_id,
            model_override: resolved.model_override,
            expert_model_id: resolved.expert_model_id,
            classification_ms: elapsed_ms,
        }
    }
}

/// Classification-based router over expert targets
pub struct ExpertRouter {
    store: Arc<dyn ConfigStore>,
    state: Arc<RoutingState>,
    classifier: Arc<dyn Classifier>,
    logger: Arc<dyn DecisionLogger>,
    settings: ClassifierSettings,
}

impl ExpertRouter {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        state: Arc<RoutingState>,
        classifier: Arc<dyn Classifier>,
        logger: Arc<dyn DecisionLogger>,
        settings: ClassifierSettings,
    ) -> Self {
        Self {
            store,
            state,
            classifier,
            logger,
            settings,
        }
    }

    /// Route a request through an expert-routing config.
    ///
    /// Fails with `ExpertRoutingUnavailable` when the config is missing or
    /// disabled (the resolver falls through); recoverable classification
    /// failures are redirected to the fallback target when one exists.
    pub async fn route(
        &self,
        request: &ProxyRequest,
        expert_routing_id: &str,
        context: &RoutingContext,
    ) -> Result<ExpertRoute> {
        let started = Instant::now();

        let record = self
            .store
            .expert_routing_config_by_id(expert_routing_id)
            .await?;
        let record = match record {
            Some(record) if record.enabled => record,
            _ => {
                warn!(expert_routing_id, "expert routing config missing or disabled");
                return Err(GatewayError::ExpertRoutingUnavailable(
                    expert_routing_id.to_string(),
                ));
            }
        };
        let config = ExpertRoutingConfig::parse(expert_routing_id, &record.config)?;

        let decision = self.classify_request(request, &config).await;

        let decision = match decision {
            Ok(decision) => decision,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "classification failed");
                if let Some(fallback) = &config.fallback {
                    return self
                        .resolve_fallback(
                            fallback,
                            "fallback",
                            started,
                            expert_routing_id,
                            context,
                            request,
                        )
                        .await;
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let Some(expert) = match_expert(&decision.category, &config.experts) else {
            warn!(category = %decision.category, "no expert matched category");
            if let Some(fallback) = &config.fallback {
                return self
                    .resolve_fallback(
                        fallback,
                        &decision.category,
                        started,
                        expert_routing_id,
                        context,
                        request,
                    )
                    .await;
            }
            return Err(GatewayError::NoExpertMatched(decision.category));
        };

        let resolved = resolve_binding(self.store.as_ref(), &expert.binding, "expert").await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let route = ExpertRoute::from_binding(
            resolved,
            decision.category.clone(),
            expert.id.clone(),
            elapsed_ms,
        );

        info!(
            category = %route.category,
            expert = %route.expert_name,
            kind = %route.expert_kind,
            "expert routing decision"
        );

        log_decision_best_effort(
            self.logger.as_ref(),
            RoutingDecisionRecord {
                id: RoutingDecisionRecord::new_id(),
                virtual_key_id: context.virtual_key_id.clone(),
                expert_routing_id: expert_routing_id.to_string(),
                request_hash: request_hash(request),
                classifier_model: decision.classifier_model,
                classifier_response: decision.raw_response,
                category: route.category.clone(),
                expert_id: route.expert_id.clone(),
                expert_kind: route.expert_kind.clone(),
                expert_name: route.expert_name.clone(),
                route_source: "llm".to_string(),
                classification_ms: elapsed_ms,
                created_at: Utc::now(),
            },
        )
        .await;

        Ok(route)
    }

    /// Preprocess the request and run the classifier
    async fn classify_request(
        &self,
        request: &ProxyRequest,
        config: &ExpertRoutingConfig,
    ) -> Result<judge::RouteDecision> {
        let signal = preprocess::build_routing_signal(request);
        if signal.is_empty() {
            return Err(GatewayError::ClassificationFailed(
                "no usable intent text in request".to_string(),
            ));
        }

        // Any failure resolving the classifier backend is a classification
        // failure, not a fatal config error: the fallback path still applies
        let (provider, model) =
            match resolve_classifier_model(self.store.as_ref(), &self.state, &config.classifier)
                .await
            {
                Ok(resolved) => resolved,
                Err(e) => return Err(GatewayError::ClassificationFailed(e.to_string())),
            };

        judge::classify(
            self.classifier.as_ref(),
            &provider,
            &model,
            &config.classifier,
            &self.settings,
            &signal,
            &config.experts,
        )
        .await
    }

    /// Resolve the fallback target and log the degraded decision
    async fn resolve_fallback(
        &self,
        fallback: &TargetBinding,
        category: &str,
        started: Instant,
        expert_routing_id: &str,
        context: &RoutingContext,
        request: &ProxyRequest,
    ) -> Result<ExpertRoute> {
        let resolved = resolve_binding(self.store.as_ref(), fallback, "fallback").await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let route = ExpertRoute::from_binding(
            resolved,
            category.to_string(),
            "fallback".to_string(),
            elapsed_ms,
        );

        info!(
            category = %route.category,
            expert = %route.expert_name,
            "expert routing degraded to fallback"
        );

        log_decision_best_effort(
            self.logger.as_ref(),
            RoutingDecisionRecord {
                id: RoutingDecisionRecord::new_id(),
                virtual_key_id: context.virtual_key_id.clone(),
                expert_routing_id: expert_routing_id.to_string(),
                request_hash: request_hash(request),
                classifier_model: "fallback".to_string(),
                classifier_response: if category == "fallback" {
                    "llm_judge_failed".to_string()
                } else {
                    "fallback_triggered".to_string()
                },
                category: route.category.clone(),
                expert_id: route.expert_id.clone(),
                expert_kind: route.expert_kind.clone(),
                expert_name: route.expert_name.clone(),
                route_source: "fallback".to_string(),
                classification_ms: elapsed_ms,
                created_at: Utc::now(),
            },
        )
        .await;

        Ok(route)
    }
}

/// Stable hash of the classified request content (messages or input)
pub fn request_hash(request: &ProxyRequest) -> String {
    let body = &request.body;
    let content = if body.get("input").is_some() || body.get("text").is_some() {
        serde_json::json!({
            "input": body.get("input").or_else(|| body.get("text")),
            "instructions": body.get("instructions"),
        })
        .to_string()
    } else {
        body.get("messages").unwrap_or(&Value::Null).to_string()
    };

    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)
}
