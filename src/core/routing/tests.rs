//! Resolution scenario tests
//!
//! End-to-end exercises of the resolver against an in-memory store: plain
//! bindings, smart routing under circuit pressure, expert chains, depth
//! guarding, and cross-target failover.

use super::resolver::ProviderResolver;
use super::retry::{RetryCoordinator, UpstreamFailure, execute_with_failover};
use super::state::RoutingState;
use crate::config::GatewaySettings;
use crate::core::expert::ExpertRouter;
use crate::core::types::{ModelRecord, ProviderRecord, Protocol, ProxyRequest, Resolution};
use crate::services::classifier::{Classifier, ClassifierError, ClassifierRequest};
use crate::services::decision_log::{MemoryDecisionLogger, NoopDecisionLogger};
use crate::storage::{
    ConfigStore, ExpertRoutingConfigRecord, MemoryConfigStore, RoutingConfigRecord, StoreResult,
};
use crate::utils::error::GatewayError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Always answers with the same classification
struct ConstClassifier {
    reply: String,
}

#[async_trait]
impl Classifier for ConstClassifier {
    async fn complete(&self, _request: ClassifierRequest) -> Result<String, ClassifierError> {
        Ok(self.reply.clone())
    }
}

/// Store wrapper that counts every lookup
struct CountingStore {
    inner: Arc<MemoryConfigStore>,
    lookups: AtomicUsize,
}

impl CountingStore {
    fn new(inner: Arc<MemoryConfigStore>) -> Self {
        Self {
            inner,
            lookups: AtomicUsize::new(0),
        }
    }

    fn count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for CountingStore {
    async fn provider_by_id(&self, id: &str) -> StoreResult<Option<ProviderRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.provider_by_id(id).await
    }

    async fn model_by_id(&self, id: &str) -> StoreResult<Option<ModelRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.model_by_id(id).await
    }

    async fn models_by_provider(&self, provider_id: &str) -> StoreResult<Vec<ModelRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.models_by_provider(provider_id).await
    }

    async fn routing_config_by_id(&self, id: &str) -> StoreResult<Option<RoutingConfigRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.routing_config_by_id(id).await
    }

    async fn expert_routing_config_by_id(
        &self,
        id: &str,
    ) -> StoreResult<Option<ExpertRoutingConfigRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.expert_routing_config_by_id(id).await
    }
}

fn provider(id: &str) -> ProviderRecord {
    ProviderRecord {
        id: id.to_string(),
        name: format!("provider-{}", id),
        base_url: format!("https://{}.example.com/v1", id),
        api_key: format!("sk-{}", id),
        enabled: true,
    }
}

fn plain_model(id: &str, provider_id: &str) -> ModelRecord {
    ModelRecord {
        id: id.to_string(),
        name: id.to_string(),
        model_identifier: format!("{}-identifier", id),
        provider_id: Some(provider_id.to_string()),
        is_virtual: false,
        routing_config_id: None,
        expert_routing_id: None,
        protocol: None,
    }
}

fn virtual_model(id: &str, routing_config_id: &str) -> ModelRecord {
    ModelRecord {
        id: id.to_string(),
        name: id.to_string(),
        model_identifier: id.to_string(),
        provider_id: None,
        is_virtual: true,
        routing_config_id: Some(routing_config_id.to_string()),
        expert_routing_id: None,
        protocol: None,
    }
}

fn routing_record(id: &str, config: &str) -> RoutingConfigRecord {
    RoutingConfigRecord {
        id: id.to_string(),
        name: format!("routing {}", id),
        config: config.to_string(),
    }
}

fn request() -> ProxyRequest {
    ProxyRequest::new(json!({
        "model": "whatever",
        "messages": [{"role": "user", "content": "hello"}]
    }))
}

fn build_resolver(store: Arc<dyn ConfigStore>, classifier_reply: &str) -> ProviderResolver {
    let settings = GatewaySettings::default();
    let state = Arc::new(RoutingState::new(&settings));
    let expert = ExpertRouter::new(
        store.clone(),
        state.clone(),
        Arc::new(ConstClassifier {
            reply: classifier_reply.to_string(),
        }),
        Arc::new(NoopDecisionLogger),
        settings.classifier.clone(),
    );
    ProviderResolver::new(store, state, expert, settings)
}

// ==================== Plain Bindings ====================

#[tokio::test]
async fn test_plain_model_resolves_directly() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    store.insert_model(plain_model("m1", "p1"));

    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m1").await.unwrap().unwrap();
    let mut req = request();

    let resolution = resolver.resolve(&model, &mut req, Some("vk-1")).await.unwrap();
    assert_eq!(resolution.provider_id, "p1");
    assert!(resolution.exclude_providers.is_none());
    assert!(resolution.model_override.is_none());
    // Protocol defaults to OpenAI when the caller didn't set one
    assert_eq!(req.protocol, Some(Protocol::OpenAI));
}

#[tokio::test]
async fn test_plain_model_missing_provider_fails() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_model(plain_model("m1", "p-gone"));

    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m1").await.unwrap().unwrap();

    let err = resolver
        .resolve(&model, &mut request(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ProviderNotFound(_)));
}

#[tokio::test]
async fn test_model_without_provider_fails() {
    let store = Arc::new(MemoryConfigStore::new());
    let model = ModelRecord {
        provider_id: None,
        ..plain_model("m1", "unused")
    };
    store.insert_model(model.clone());

    let resolver = build_resolver(store, "{}");
    let err = resolver
        .resolve(&model, &mut request(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ModelHasNoProvider(_)));
}

// ==================== Smart Routing ====================

#[tokio::test]
async fn test_fallback_strategy_skips_circuit_open_target() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    store.insert_provider(provider("p2"));
    store.insert_routing_config(routing_record(
        "rc-1",
        r#"{"strategy": {"mode": "fallback"},
            "targets": [{"provider": "p1"}, {"provider": "p2"}]}"#,
    ));
    store.insert_model(virtual_model("m-virtual", "rc-1"));

    let resolver = build_resolver(store.clone(), "{}");
    // Trip p1's circuit
    resolver.state().breaker.record_failure("p1", None);
    resolver.state().breaker.record_failure("p1", None);

    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();
    let resolution = resolver
        .resolve(&model, &mut request(), Some("vk-1"))
        .await
        .unwrap();
    assert_eq!(resolution.provider_id, "p2");
}

#[tokio::test]
async fn test_smart_routing_applies_override_and_recovers_metadata() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    let mut real = plain_model("m-real", "p1");
    real.model_identifier = "gpt-4o-mini".to_string();
    real.protocol = Some(Protocol::OpenAI);
    store.insert_model(real);
    store.insert_routing_config(routing_record(
        "rc-1",
        r#"{"strategy": {"mode": "fallback"},
            "targets": [{"provider": "p1", "override_params": {"model": "gpt-4o-mini"}}]}"#,
    ));
    store.insert_model(virtual_model("m-virtual", "rc-1"));

    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();
    let mut req = request();

    let resolution = resolver.resolve(&model, &mut req, None).await.unwrap();
    assert_eq!(resolution.model_override.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(req.model(), Some("gpt-4o-mini"));
    let resolved = resolution.resolved_model.unwrap();
    assert_eq!(resolved.id, "m-real");
    assert_eq!(resolved.protocol, Some(Protocol::OpenAI));
    // The selected provider is seeded into the exclusion set for retries
    let exclusions = resolution.exclude_providers.unwrap();
    assert!(exclusions.contains("p1"));
}

#[tokio::test]
async fn test_missing_override_model_is_not_fatal() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    store.insert_routing_config(routing_record(
        "rc-1",
        r#"{"strategy": {"mode": "fallback"},
            "targets": [{"provider": "p1", "override_params": {"model": "unknown-model"}}]}"#,
    ));
    store.insert_model(virtual_model("m-virtual", "rc-1"));

    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();

    let resolution = resolver.resolve(&model, &mut request(), None).await.unwrap();
    assert_eq!(resolution.model_override.as_deref(), Some("unknown-model"));
    assert!(resolution.resolved_model.is_none());
}

#[tokio::test]
async fn test_zero_targets_is_fatal_config_error() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_routing_config(routing_record(
        "rc-empty",
        r#"{"strategy": {"mode": "loadbalance"}, "targets": []}"#,
    ));
    store.insert_model(virtual_model("m-virtual", "rc-empty"));

    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();

    let err = resolver
        .resolve(&model, &mut request(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NoTargetsConfigured(_)));
    assert_eq!(err.http_status(), 500);
}

#[tokio::test]
async fn test_all_targets_excluded_is_transient_503() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    store.insert_routing_config(routing_record(
        "rc-1",
        r#"{"strategy": {"mode": "loadbalance"}, "targets": [{"provider": "p1"}]}"#,
    ));
    store.insert_model(virtual_model("m-virtual", "rc-1"));

    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();
    let exclude: HashSet<String> = ["p1".to_string()].into_iter().collect();

    let err = resolver
        .resolve_smart_routing(&model, &mut request(), None, Some(&exclude))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::AllTargetsUnavailable(_)));
    assert_eq!(err.http_status(), 503);
}

#[tokio::test]
async fn test_missing_routing_config_is_config_error() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_model(virtual_model("m-virtual", "rc-gone"));

    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();

    let err = resolver
        .resolve(&model, &mut request(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Config(_)));
}

#[tokio::test]
async fn test_hash_mode_uses_virtual_key_consistently() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    store.insert_provider(provider("p2"));
    store.insert_routing_config(routing_record(
        "rc-hash",
        r#"{"strategy": {"mode": "hash", "hashSource": "virtualKey"},
            "targets": [{"provider": "p1", "weight": 1}, {"provider": "p2", "weight": 1}]}"#,
    ));
    store.insert_model(virtual_model("m-virtual", "rc-hash"));

    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();

    let first = resolver
        .resolve(&model, &mut request(), Some("vk-sticky"))
        .await
        .unwrap();
    for _ in 0..10 {
        let again = resolver
            .resolve(&model, &mut request(), Some("vk-sticky"))
            .await
            .unwrap();
        assert_eq!(again.provider_id, first.provider_id);
    }
}

// ==================== Depth Guard ====================

#[tokio::test]
async fn test_depth_exceeded_fails_before_any_lookup() {
    let inner = Arc::new(MemoryConfigStore::new());
    inner.insert_provider(provider("p1"));
    inner.insert_model(plain_model("m1", "p1"));
    let counting = Arc::new(CountingStore::new(inner.clone()));

    let resolver = build_resolver(counting.clone(), "{}");
    let model = inner.model_by_id("m1").await.unwrap().unwrap();

    let err = resolver
        .resolve_at(&model, &mut request(), None, 6)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MaxDepthExceeded { depth: 6 }));
    assert_eq!(counting.count(), 0);
}

#[tokio::test]
async fn test_cyclic_expert_chain_hits_depth_guard() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p-judge"));
    // m-loop routes through er-loop, whose only expert is m-loop again
    store.insert_model(ModelRecord {
        id: "m-loop".to_string(),
        name: "m-loop".to_string(),
        model_identifier: "m-loop".to_string(),
        provider_id: None,
        is_virtual: true,
        routing_config_id: None,
        expert_routing_id: Some("er-loop".to_string()),
        protocol: None,
    });
    store.insert_expert_routing_config(ExpertRoutingConfigRecord {
        id: "er-loop".to_string(),
        name: "loop".to_string(),
        enabled: true,
        config: r#"{
            "classifier": {"type": "real", "provider_id": "p-judge", "model": "judge"},
            "experts": [
                {"id": "e-loop", "category": "loop", "type": "virtual", "model_id": "m-loop"}
            ]
        }"#
        .to_string(),
    });

    let resolver = build_resolver(store.clone(), r#"{"type": "loop"}"#);
    let model = store.model_by_id("m-loop").await.unwrap().unwrap();

    let err = resolver
        .resolve(&model, &mut request(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MaxDepthExceeded { .. }));
}

// ==================== Expert Routing Integration ====================

#[tokio::test]
async fn test_disabled_expert_config_falls_through_to_smart_routing() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    store.insert_routing_config(routing_record(
        "rc-1",
        r#"{"strategy": {"mode": "fallback"}, "targets": [{"provider": "p1"}]}"#,
    ));
    store.insert_expert_routing_config(ExpertRoutingConfigRecord {
        id: "er-off".to_string(),
        name: "disabled".to_string(),
        enabled: false,
        config: "{}".to_string(),
    });
    let mut model = virtual_model("m-virtual", "rc-1");
    model.expert_routing_id = Some("er-off".to_string());
    store.insert_model(model.clone());

    let resolver = build_resolver(store, "{}");
    let resolution = resolver.resolve(&model, &mut request(), None).await.unwrap();
    assert_eq!(resolution.provider_id, "p1");
}

#[tokio::test]
async fn test_expert_virtual_chain_resolves_through_smart_routing() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p-judge"));
    store.insert_provider(provider("p-code"));
    store.insert_routing_config(routing_record(
        "rc-code",
        r#"{"strategy": {"mode": "fallback"},
            "targets": [{"provider": "p-code", "override_params": {"model": "coder-xl"}}]}"#,
    ));
    store.insert_model(virtual_model("m-code", "rc-code"));
    store.insert_model(ModelRecord {
        id: "m-entry".to_string(),
        name: "m-entry".to_string(),
        model_identifier: "m-entry".to_string(),
        provider_id: None,
        is_virtual: true,
        routing_config_id: None,
        expert_routing_id: Some("er-1".to_string()),
        protocol: None,
    });
    store.insert_expert_routing_config(ExpertRoutingConfigRecord {
        id: "er-1".to_string(),
        name: "experts".to_string(),
        enabled: true,
        config: r#"{
            "classifier": {"type": "real", "provider_id": "p-judge", "model": "judge"},
            "experts": [
                {"id": "e-code", "category": "code", "type": "virtual", "model_id": "m-code"}
            ]
        }"#
        .to_string(),
    });

    let resolver = build_resolver(store.clone(), r#"{"type": "code"}"#);
    let model = store.model_by_id("m-entry").await.unwrap().unwrap();
    let mut req = request();

    let resolution = resolver.resolve(&model, &mut req, Some("vk-1")).await.unwrap();
    // The expert's virtual model resolved through its routing config
    assert_eq!(resolution.provider_id, "p-code");
    assert_eq!(resolution.model_override.as_deref(), Some("coder-xl"));
    assert_eq!(req.model(), Some("coder-xl"));
}

// ==================== Failover Driver ====================

struct FailPlan {
    /// provider id -> status it fails with
    failures: Vec<(String, u16)>,
    attempts: Mutex<Vec<String>>,
}

impl FailPlan {
    fn new(failures: &[(&str, u16)]) -> Arc<Self> {
        Arc::new(Self {
            failures: failures
                .iter()
                .map(|(id, status)| (id.to_string(), *status))
                .collect(),
            attempts: Mutex::new(Vec::new()),
        })
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

fn failover_store() -> Arc<MemoryConfigStore> {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    store.insert_provider(provider("p2"));
    store.insert_routing_config(routing_record(
        "rc-1",
        r#"{"strategy": {"mode": "fallback"},
            "targets": [{"provider": "p1"}, {"provider": "p2"}]}"#,
    ));
    store.insert_model(virtual_model("m-virtual", "rc-1"));
    store
}

async fn run_failover(
    resolver: &ProviderResolver,
    model: &ModelRecord,
    plan: Arc<FailPlan>,
) -> crate::utils::error::Result<String> {
    let mut req = request();
    execute_with_failover(
        resolver,
        model,
        &mut req,
        Some("vk-1"),
        &NoopDecisionLogger,
        |resolution: Resolution, _body| {
            let plan = plan.clone();
            async move {
                plan.attempts.lock().push(resolution.provider_id.clone());
                match plan
                    .failures
                    .iter()
                    .find(|(id, _)| *id == resolution.provider_id)
                {
                    Some((_, status)) => Err(UpstreamFailure {
                        status: *status,
                        message: format!("{} failed", resolution.provider_id),
                    }),
                    None => Ok(resolution.provider_id),
                }
            }
        },
    )
    .await
}

#[tokio::test]
async fn test_failover_moves_to_next_target_on_retryable_status() {
    let store = failover_store();
    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();
    let plan = FailPlan::new(&[("p1", 503)]);

    let served_by = run_failover(&resolver, &model, plan.clone()).await.unwrap();
    assert_eq!(served_by, "p2");
    assert_eq!(plan.attempts(), vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_failover_stops_on_non_retryable_status() {
    let store = failover_store();
    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();
    let plan = FailPlan::new(&[("p1", 401)]);

    let err = run_failover(&resolver, &model, plan.clone()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Upstream { status: 401, .. }));
    assert_eq!(plan.attempts(), vec!["p1"]);
}

#[tokio::test]
async fn test_failover_surfaces_last_error_when_targets_exhausted() {
    let store = failover_store();
    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();
    let plan = FailPlan::new(&[("p1", 503), ("p2", 502)]);

    let err = run_failover(&resolver, &model, plan.clone()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Upstream { status: 502, .. }));
    assert_eq!(plan.attempts(), vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_failover_records_breaker_outcomes() {
    let store = failover_store();
    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();
    let plan = FailPlan::new(&[("p1", 503)]);

    run_failover(&resolver, &model, plan).await.unwrap();
    assert_eq!(resolver.state().breaker.provider_stats("p1").failures, 1);
    assert_eq!(resolver.state().breaker.provider_stats("p2").failures, 0);
}

#[tokio::test]
async fn test_plain_model_failure_is_not_retried() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    store.insert_model(plain_model("m1", "p1"));

    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m1").await.unwrap().unwrap();
    let plan = FailPlan::new(&[("p1", 503)]);

    let err = run_failover(&resolver, &model, plan.clone()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Upstream { status: 503, .. }));
    assert_eq!(plan.attempts(), vec!["p1"]);
}

#[tokio::test]
async fn test_breaker_trip_is_reported_to_logger() {
    let store = failover_store();
    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();
    let logger = MemoryDecisionLogger::new();

    // Two failing rounds trip p1's breaker (threshold 2)
    for _ in 0..2 {
        let mut req = request();
        let _ = execute_with_failover(
            &resolver,
            &model,
            &mut req,
            None,
            &logger,
            |resolution: Resolution, _body| async move {
                if resolution.provider_id == "p1" {
                    Err::<String, _>(UpstreamFailure {
                        status: 503,
                        message: "p1 down".to_string(),
                    })
                } else {
                    Ok(resolution.provider_id)
                }
            },
        )
        .await;
    }

    let triggers = logger.triggers();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].provider_id, "p1");
}

// ==================== Retry Coordinator ====================

#[tokio::test]
async fn test_coordinator_requires_smart_routing() {
    let store = Arc::new(MemoryConfigStore::new());
    store.insert_provider(provider("p1"));
    store.insert_model(plain_model("m1", "p1"));
    let resolver = build_resolver(store.clone(), "{}");

    let model = store.model_by_id("m1").await.unwrap().unwrap();
    let mut req = request();
    let resolution = resolver.resolve(&model, &mut req, None).await.unwrap();

    let coordinator = RetryCoordinator::new(&model, &resolution, Duration::from_secs(10));
    assert!(!coordinator.can_retry());
}

#[tokio::test]
async fn test_coordinator_grows_exclusions_across_retries() {
    let store = failover_store();
    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();

    let mut req = request();
    let resolution = resolver.resolve(&model, &mut req, None).await.unwrap();
    assert_eq!(resolution.provider_id, "p1");

    let mut coordinator = RetryCoordinator::new(&model, &resolution, Duration::from_secs(10));
    assert!(coordinator.can_retry());
    assert_eq!(coordinator.attempted(), 1);

    let next = coordinator
        .next_target(&resolver, &mut req, None, 503)
        .await
        .unwrap();
    assert_eq!(next.provider_id, "p2");
    assert_eq!(coordinator.attempted(), 2);

    // Both targets attempted: nothing left
    let done = coordinator.next_target(&resolver, &mut req, None, 503).await;
    assert!(done.is_none());
}

#[tokio::test]
async fn test_coordinator_honors_retry_window() {
    let store = failover_store();
    let resolver = build_resolver(store.clone(), "{}");
    let model = store.model_by_id("m-virtual").await.unwrap().unwrap();

    let mut req = request();
    let resolution = resolver.resolve(&model, &mut req, None).await.unwrap();

    let mut coordinator = RetryCoordinator::new(&model, &resolution, Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(5)).await;
    let next = coordinator.next_target(&resolver, &mut req, None, 503).await;
    assert!(next.is_none());
}
