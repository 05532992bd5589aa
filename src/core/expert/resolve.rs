//! Expert and classifier target resolution
//!
//! Maps a classified category onto an expert, and resolves the three binding
//! shapes (classifier, expert, fallback) against the config store. The
//! classifier binding gets special treatment: a classifier bound to a
//! virtual model follows that model's routing config through the selector
//! (without exclusions) down to a concrete provider and model, since the
//! classification call happens outside the normal resolution recursion.

use super::config::{ClassifierConfig, ExpertTarget, TargetBinding};
use crate::core::routing::config::RoutingConfig;
use crate::core::routing::state::RoutingState;
use crate::core::types::ProviderRecord;
use crate::storage::ConfigStore;
use crate::utils::error::{GatewayError, Result};

/// Match a classified category against the configured experts.
///
/// Categories are normalized (trim + lowercase). Exact match wins; failing
/// that, substring containment in either direction, first declared match
/// first.
pub fn match_expert<'a>(category: &str, experts: &'a [ExpertTarget]) -> Option<&'a ExpertTarget> {
    let normalized = category.trim().to_lowercase();

    if let Some(exact) = experts
        .iter()
        .find(|e| e.category.trim().to_lowercase() == normalized)
    {
        return Some(exact);
    }

    experts.iter().find(|e| {
        let expert_category = e.category.trim().to_lowercase();
        !expert_category.is_empty()
            && (normalized.contains(&expert_category) || expert_category.contains(&normalized))
    })
}

/// A resolved expert or fallback target
#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    /// Present for real bindings
    pub provider: Option<ProviderRecord>,
    pub provider_id: Option<String>,
    pub model_override: Option<String>,
    /// Present for virtual bindings; the caller recurses on this model
    pub expert_model_id: Option<String>,
    /// Human-readable label for the decision log
    pub expert_name: String,
}

/// Resolve an expert or fallback binding against the store.
///
/// `context` names the binding in error messages ("expert", "fallback").
pub async fn resolve_binding(
    store: &dyn ConfigStore,
    binding: &TargetBinding,
    context: &str,
) -> Result<ResolvedBinding> {
    match binding {
        TargetBinding::Virtual { model_id } => {
            let model = store
                .model_by_id(model_id)
                .await?
                .ok_or_else(|| {
                    GatewayError::ModelNotFound(format!("{} virtual model {}", context, model_id))
                })?;
            Ok(ResolvedBinding {
                provider: None,
                provider_id: None,
                model_override: None,
                expert_model_id: Some(model_id.clone()),
                expert_name: model.name,
            })
        }
        TargetBinding::Real { provider_id, model } => {
            let provider = store
                .provider_by_id(provider_id)
                .await?
                .ok_or_else(|| {
                    GatewayError::ProviderNotFound(format!(
                        "{} provider {}",
                        context, provider_id
                    ))
                })?;
            let expert_name = format!("{}/{}", provider.name, model);
            Ok(ResolvedBinding {
                provider: Some(provider),
                provider_id: Some(provider_id.clone()),
                model_override: Some(model.clone()),
                expert_model_id: None,
                expert_name,
            })
        }
    }
}

/// Resolve the classifier binding to a concrete (provider, model) pair
pub async fn resolve_classifier_model(
    store: &dyn ConfigStore,
    state: &RoutingState,
    config: &ClassifierConfig,
) -> Result<(ProviderRecord, String)> {
    match &config.binding {
        TargetBinding::Real { provider_id, model } => {
            let provider = store.provider_by_id(provider_id).await?.ok_or_else(|| {
                GatewayError::Config(format!("classifier provider not found: {}", provider_id))
            })?;
            Ok((provider, model.clone()))
        }
        TargetBinding::Virtual { model_id } => {
            let model = store.model_by_id(model_id).await?.ok_or_else(|| {
                GatewayError::Config(format!("classifier virtual model not found: {}", model_id))
            })?;

            if let Some(routing_config_id) = &model.routing_config_id {
                let record = store
                    .routing_config_by_id(routing_config_id)
                    .await?
                    .ok_or_else(|| {
                        GatewayError::Config(format!(
                            "routing config not found for classifier virtual model: {}",
                            routing_config_id
                        ))
                    })?;
                let routing_config = RoutingConfig::parse(routing_config_id, &record.config)?;

                let target = state
                    .select_target(&routing_config, Some(routing_config_id.as_str()), None, None)
                    .ok_or_else(|| {
                        GatewayError::Config(format!(
                            "no available target in routing config for classifier virtual model {:?}",
                            model.name
                        ))
                    })?;

                let provider = store.provider_by_id(&target.provider).await?.ok_or_else(|| {
                    GatewayError::Config(format!(
                        "provider not found for classifier routing target: {}",
                        target.provider
                    ))
                })?;

                let model_name = target
                    .model_override()
                    .map(str::to_string)
                    .unwrap_or_else(|| model.model_identifier.clone());
                Ok((provider, model_name))
            } else if model.expert_routing_id.is_some() {
                Err(GatewayError::Config(format!(
                    "classifier virtual model {:?} uses expert routing and cannot be resolved \
                     as a classifier",
                    model.name
                )))
            } else if let Some(provider_id) = &model.provider_id {
                let provider = store.provider_by_id(provider_id).await?.ok_or_else(|| {
                    GatewayError::Config(format!(
                        "classifier provider not found for virtual model: {}",
                        provider_id
                    ))
                })?;
                Ok((provider, model.model_identifier))
            } else {
                Err(GatewayError::Config(format!(
                    "classifier virtual model {:?} has no provider or routing configured",
                    model.name
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ModelRecord;
    use crate::storage::{MemoryConfigStore, RoutingConfigRecord};

    fn expert(category: &str) -> ExpertTarget {
        ExpertTarget {
            id: format!("e-{}", category),
            category: category.to_string(),
            binding: TargetBinding::Virtual {
                model_id: "m1".into(),
            },
            description: None,
            system_prompt: None,
        }
    }

    fn provider(id: &str) -> ProviderRecord {
        ProviderRecord {
            id: id.to_string(),
            name: format!("provider-{}", id),
            base_url: "https://api.example.com/v1".to_string(),
            api_key: "sk-test".to_string(),
            enabled: true,
        }
    }

    // ==================== Expert Matching ====================

    #[test]
    fn test_exact_match_wins() {
        let experts = vec![expert("code"), expert("chat")];
        let matched = match_expert("chat", &experts).unwrap();
        assert_eq!(matched.category, "chat");
    }

    #[test]
    fn test_match_is_case_and_whitespace_insensitive() {
        let experts = vec![expert("Billing")];
        assert!(match_expert("  billing  ", &experts).is_some());
    }

    #[test]
    fn test_partial_match_in_either_direction() {
        let experts = vec![expert("billing")];
        // classifier said more than the category
        assert!(match_expert("Billing Question", &experts).is_some());
        // classifier said less than the category
        let experts = vec![expert("code generation")];
        assert!(match_expert("code", &experts).is_some());
    }

    #[test]
    fn test_first_declared_partial_match_wins() {
        let experts = vec![expert("code review"), expert("code generation")];
        let matched = match_expert("code", &experts).unwrap();
        assert_eq!(matched.category, "code review");
    }

    #[test]
    fn test_no_match_returns_none() {
        let experts = vec![expert("code"), expert("chat")];
        assert!(match_expert("poetry", &experts).is_none());
    }

    // ==================== Binding Resolution ====================

    #[tokio::test]
    async fn test_resolve_real_binding() {
        let store = MemoryConfigStore::new();
        store.insert_provider(provider("p1"));

        let binding = TargetBinding::Real {
            provider_id: "p1".into(),
            model: "gpt-4o".into(),
        };
        let resolved = resolve_binding(&store, &binding, "expert").await.unwrap();
        assert_eq!(resolved.provider_id.as_deref(), Some("p1"));
        assert_eq!(resolved.model_override.as_deref(), Some("gpt-4o"));
        assert_eq!(resolved.expert_name, "provider-p1/gpt-4o");
        assert!(resolved.expert_model_id.is_none());
    }

    #[tokio::test]
    async fn test_resolve_virtual_binding() {
        let store = MemoryConfigStore::new();
        store.insert_model(ModelRecord {
            id: "m-virtual".into(),
            name: "virtual-chat".into(),
            model_identifier: "virtual-chat".into(),
            provider_id: None,
            is_virtual: true,
            routing_config_id: Some("rc-1".into()),
            expert_routing_id: None,
            protocol: None,
        });

        let binding = TargetBinding::Virtual {
            model_id: "m-virtual".into(),
        };
        let resolved = resolve_binding(&store, &binding, "expert").await.unwrap();
        assert_eq!(resolved.expert_model_id.as_deref(), Some("m-virtual"));
        assert_eq!(resolved.expert_name, "virtual-chat");
        assert!(resolved.provider.is_none());
    }

    #[tokio::test]
    async fn test_resolve_dangling_binding_fails() {
        let store = MemoryConfigStore::new();
        let binding = TargetBinding::Real {
            provider_id: "missing".into(),
            model: "gpt-4o".into(),
        };
        let err = resolve_binding(&store, &binding, "fallback").await.unwrap_err();
        assert!(matches!(err, GatewayError::ProviderNotFound(_)));
        assert!(err.to_string().contains("fallback"));
    }

    // ==================== Classifier Resolution ====================

    fn classifier_config(binding: TargetBinding) -> ClassifierConfig {
        ClassifierConfig {
            binding,
            system_prompt: None,
            prompt_template: None,
            temperature: None,
            max_tokens: None,
            timeout_ms: None,
            ignored_tags: vec![],
            enable_structured_output: false,
        }
    }

    #[tokio::test]
    async fn test_classifier_real_binding() {
        let store = MemoryConfigStore::new();
        store.insert_provider(provider("p-judge"));
        let state = RoutingState::default();

        let config = classifier_config(TargetBinding::Real {
            provider_id: "p-judge".into(),
            model: "tiny-judge".into(),
        });
        let (resolved_provider, model) = resolve_classifier_model(&store, &state, &config)
            .await
            .unwrap();
        assert_eq!(resolved_provider.id, "p-judge");
        assert_eq!(model, "tiny-judge");
    }

    #[tokio::test]
    async fn test_classifier_virtual_model_follows_routing_config() {
        let store = MemoryConfigStore::new();
        store.insert_provider(provider("p1"));
        store.insert_model(ModelRecord {
            id: "m-judge".into(),
            name: "judge".into(),
            model_identifier: "judge-default".into(),
            provider_id: None,
            is_virtual: true,
            routing_config_id: Some("rc-judge".into()),
            expert_routing_id: None,
            protocol: None,
        });
        store.insert_routing_config(RoutingConfigRecord {
            id: "rc-judge".into(),
            name: "judge routing".into(),
            config: r#"{
                "strategy": {"mode": "fallback"},
                "targets": [{"provider": "p1", "override_params": {"model": "tiny-judge"}}]
            }"#
            .to_string(),
        });

        let state = RoutingState::default();
        let config = classifier_config(TargetBinding::Virtual {
            model_id: "m-judge".into(),
        });
        let (resolved_provider, model) = resolve_classifier_model(&store, &state, &config)
            .await
            .unwrap();
        assert_eq!(resolved_provider.id, "p1");
        assert_eq!(model, "tiny-judge");
    }

    #[tokio::test]
    async fn test_classifier_virtual_model_with_direct_provider() {
        let store = MemoryConfigStore::new();
        store.insert_provider(provider("p1"));
        store.insert_model(ModelRecord {
            id: "m-judge".into(),
            name: "judge".into(),
            model_identifier: "tiny-judge".into(),
            provider_id: Some("p1".into()),
            is_virtual: false,
            routing_config_id: None,
            expert_routing_id: None,
            protocol: None,
        });

        let state = RoutingState::default();
        let config = classifier_config(TargetBinding::Virtual {
            model_id: "m-judge".into(),
        });
        let (_, model) = resolve_classifier_model(&store, &state, &config)
            .await
            .unwrap();
        assert_eq!(model, "tiny-judge");
    }

    #[tokio::test]
    async fn test_classifier_expert_routing_model_is_rejected() {
        let store = MemoryConfigStore::new();
        store.insert_model(ModelRecord {
            id: "m-judge".into(),
            name: "judge".into(),
            model_identifier: "judge".into(),
            provider_id: None,
            is_virtual: true,
            routing_config_id: None,
            expert_routing_id: Some("er-1".into()),
            protocol: None,
        });

        let state = RoutingState::default();
        let config = classifier_config(TargetBinding::Virtual {
            model_id: "m-judge".into(),
        });
        let err = resolve_classifier_model(&store, &state, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(err.to_string().contains("expert routing"));
    }
}
