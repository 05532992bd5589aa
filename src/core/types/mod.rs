//! Core record types shared across the resolution engine
//!
//! These mirror the configuration store's row shapes: providers, models
//! (real and virtual), and the per-request structures the resolver produces.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Wire protocol a model speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    OpenAI,
    Anthropic,
}

/// Upstream provider record
///
/// Owned by the config store; read-only to the routing core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Unique provider id
    pub id: String,
    /// Display name
    pub name: String,
    /// API base URL (e.g. "https://api.example.com/v1")
    pub base_url: String,
    /// Credential forwarded to the provider
    pub api_key: String,
    /// Disabled providers are never selected
    pub enabled: bool,
}

/// Model record, real or virtual
///
/// A model is virtual iff it has no direct provider binding and instead
/// carries a routing or expert-routing reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Unique model id
    pub id: String,
    /// Display name
    pub name: String,
    /// Identifier sent to the upstream provider (e.g. "gpt-4o-mini")
    pub model_identifier: String,
    /// Direct provider binding (plain models)
    #[serde(default)]
    pub provider_id: Option<String>,
    /// Virtual models resolve through smart or expert routing
    #[serde(default)]
    pub is_virtual: bool,
    /// Smart-routing config reference
    #[serde(default)]
    pub routing_config_id: Option<String>,
    /// Expert-routing config reference
    #[serde(default)]
    pub expert_routing_id: Option<String>,
    /// Wire protocol; None means auto-detect downstream
    #[serde(default)]
    pub protocol: Option<Protocol>,
}

impl ModelRecord {
    /// Whether this model matches a requested name or upstream identifier
    pub fn matches_name(&self, requested: &str) -> bool {
        self.model_identifier == requested || self.name == requested
    }
}

/// The inbound request as seen by the resolution engine
///
/// The body is the raw JSON the client sent; smart and expert routing may
/// rewrite `body.model` with a target's override before the upstream call.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub body: Value,
    pub protocol: Option<Protocol>,
}

impl ProxyRequest {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            protocol: None,
        }
    }

    /// Overwrite the model field in the request body
    pub fn set_model(&mut self, model: &str) {
        if let Some(obj) = self.body.as_object_mut() {
            obj.insert("model".to_string(), Value::String(model.to_string()));
        }
    }

    /// The model field of the request body, if present
    pub fn model(&self) -> Option<&str> {
        self.body.get("model").and_then(Value::as_str)
    }
}

/// Outcome of resolving a model to a concrete upstream target
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The selected provider record
    pub provider: ProviderRecord,
    /// Convenience copy of `provider.id`
    pub provider_id: String,
    /// Model identifier the selected target overrides the request with
    pub model_override: Option<String>,
    /// Real model metadata recovered for the override, when found
    pub resolved_model: Option<ModelRecord>,
    /// Providers already attempted in this logical request; present only for
    /// smart-routing resolutions, which are the retryable kind
    pub exclude_providers: Option<HashSet<String>>,
}
