//! # modelgate
//!
//! The request-resolution and smart-routing core of an LLM gateway. A caller
//! addresses many model backends through one virtual key; this crate decides
//! which concrete (provider, model) pair serves each request.
//!
//! ## Features
//!
//! - **Virtual models**: models with no direct provider, resolved through
//!   routing configuration at request time
//! - **Smart routing**: loadbalance / fallback / hash / affinity selection
//!   among real-provider targets
//! - **Circuit breaking**: per-provider failure isolation with cooldowns and
//!   half-open probes
//! - **Expert routing**: LLM-classified, category-based selection among
//!   expert targets, with a fallback path for classifier trouble
//! - **Safe retries**: a growing exclusion set per logical request, so a
//!   failed target is never tried twice
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modelgate::{
//!     ConfigStore, GatewaySettings, MemoryConfigStore, ProviderResolver, ProxyRequest,
//!     RoutingState,
//! };
//! use modelgate::core::expert::ExpertRouter;
//! use modelgate::services::{HttpClassifier, NoopDecisionLogger};
//! use std::sync::Arc;
//!
//! # async fn run() -> modelgate::Result<()> {
//! let settings = GatewaySettings::from_env()?;
//! let store = Arc::new(MemoryConfigStore::new());
//! let state = Arc::new(RoutingState::new(&settings));
//!
//! let expert = ExpertRouter::new(
//!     store.clone(),
//!     state.clone(),
//!     Arc::new(HttpClassifier::new()),
//!     Arc::new(NoopDecisionLogger),
//!     settings.classifier.clone(),
//! );
//! let resolver = ProviderResolver::new(store.clone(), state, expert, settings);
//!
//! let model = store.model_by_id("my-virtual-model").await?.unwrap();
//! let mut request = ProxyRequest::new(serde_json::json!({
//!     "model": "my-virtual-model",
//!     "messages": [{"role": "user", "content": "hello"}]
//! }));
//! let resolution = resolver.resolve(&model, &mut request, Some("vk-1")).await?;
//! println!("routed to {}", resolution.provider.name);
//! # Ok(())
//! # }
//! ```
//!
//! The resolver is an in-process function called once per logical client
//! request (and again per retry) by the HTTP proxy handler; this crate
//! exposes no network surface of its own.

#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export main types
pub use crate::config::{BreakerSettings, ClassifierSettings, GatewaySettings, RoutingSettings};
pub use crate::core::breaker::{BreakerTransition, CircuitBreaker, CircuitState};
pub use crate::core::expert::{ExpertRoute, ExpertRouter, RoutingContext};
pub use crate::core::routing::{
    AffinityCache, ProviderResolver, RetryCoordinator, RoutingConfig, RoutingState,
    RoutingStrategy, RoutingTarget, UpstreamFailure, execute_with_failover, should_retry_status,
};
pub use crate::core::types::{ModelRecord, Protocol, ProviderRecord, ProxyRequest, Resolution};
pub use crate::services::{Classifier, DecisionLogger, HttpClassifier, NoopDecisionLogger};
pub use crate::storage::{ConfigStore, MemoryConfigStore, StoreError};
pub use crate::utils::error::{GatewayError, Result};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
