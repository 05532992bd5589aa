//! Smart-routing configuration model
//!
//! Routing configs are stored as serialized JSON blobs; this module is the
//! typed boundary. The strategy is a tagged union over `mode`, so an
//! unrecognized mode fails deserialization instead of leaking untyped data
//! into the selector. Field names follow the stored format (`provider`,
//! `override_params`, `on_status_codes`, `hashSource`, `affinityTTL`).

use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default affinity TTL when a config doesn't set one
pub const DEFAULT_AFFINITY_TTL_MS: u64 = 5 * 60 * 1000;

/// Source of the key for hash-mode routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HashSource {
    /// Hash the virtual key id: one caller always lands on one target
    #[default]
    VirtualKey,
    /// Hash the serialized request body: identical requests co-locate
    Request,
}

/// Selection strategy, tagged on `mode`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RoutingStrategy {
    /// Weighted random selection among available targets
    Loadbalance,
    /// First available target in declared order (priority, not round-robin)
    Fallback,
    /// Deterministic weight-bucket placement by hash key
    Hash {
        #[serde(default, rename = "hashSource")]
        hash_source: HashSource,
    },
    /// Stick to one provider for a time window
    Affinity {
        /// TTL in milliseconds; defaults to 5 minutes
        #[serde(default, rename = "affinityTTL")]
        affinity_ttl_ms: Option<u64>,
    },
}

impl RoutingStrategy {
    /// Affinity TTL with the default applied (affinity mode only)
    pub fn affinity_ttl(&self) -> Duration {
        match self {
            RoutingStrategy::Affinity { affinity_ttl_ms } => {
                Duration::from_millis(affinity_ttl_ms.unwrap_or(DEFAULT_AFFINITY_TTL_MS))
            }
            _ => Duration::from_millis(DEFAULT_AFFINITY_TTL_MS),
        }
    }
}

/// Model override carried by a routing target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideParams {
    #[serde(default)]
    pub model: Option<String>,
}

/// One selectable upstream target within a routing config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTarget {
    /// Provider id
    pub provider: String,
    /// Selection weight; absent or zero targets are unweighted
    #[serde(default)]
    pub weight: Option<u32>,
    /// Request overrides applied when this target is selected
    #[serde(default)]
    pub override_params: Option<OverrideParams>,
    /// Status codes this target is declared to fail over on
    #[serde(default)]
    pub on_status_codes: Option<Vec<u16>>,
}

impl RoutingTarget {
    /// Weight with the hash-mode default applied: absent and zero weights
    /// both count as 1
    pub fn weight_or_default(&self) -> u32 {
        match self.weight {
            Some(weight) if weight > 0 => weight,
            _ => 1,
        }
    }

    /// Model override for this target, if any
    pub fn model_override(&self) -> Option<&str> {
        self.override_params
            .as_ref()
            .and_then(|p| p.model.as_deref())
    }
}

/// A parsed smart-routing config: strategy plus ordered targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub strategy: RoutingStrategy,
    #[serde(default)]
    pub targets: Vec<RoutingTarget>,
}

impl RoutingConfig {
    /// Parse the stored JSON blob, failing fast on unknown strategy modes
    pub fn parse(config_id: &str, raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            GatewayError::Config(format!(
                "failed to parse routing config {}: {}",
                config_id, e
            ))
        })
    }
}
