//! Runtime settings for the routing core
//!
//! Settings carry engine-level knobs only (depth bound, retry window,
//! breaker thresholds, classifier defaults); per-route behavior lives in the
//! stored routing and expert-routing configs. Values can be overridden from
//! the environment or loaded from a YAML file.

use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Engine-wide settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub routing: RoutingSettings,
    pub breaker: BreakerSettings,
    pub classifier: ClassifierSettings,
}

/// Resolution and affinity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Maximum recursion depth for virtual-model chains (cycle guard)
    pub max_resolve_depth: u8,

    /// Wall-clock budget for cross-target retries of one logical request
    pub retry_window_ms: u64,

    /// Default affinity TTL when a config doesn't set one
    pub default_affinity_ttl_ms: u64,

    /// How often the affinity sweep runs
    pub affinity_sweep_interval_secs: u64,

    /// Affinity entries older than this are purged regardless of TTL
    pub affinity_max_age_secs: u64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            max_resolve_depth: 5,
            retry_window_ms: 10_000,
            default_affinity_ttl_ms: 5 * 60 * 1000,
            affinity_sweep_interval_secs: 60 * 60,
            affinity_max_age_secs: 24 * 60 * 60,
        }
    }
}

impl RoutingSettings {
    pub fn retry_window(&self) -> Duration {
        Duration::from_millis(self.retry_window_ms)
    }

    pub fn default_affinity_ttl(&self) -> Duration {
        Duration::from_millis(self.default_affinity_ttl_ms)
    }

    pub fn affinity_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.affinity_sweep_interval_secs)
    }

    pub fn affinity_max_age(&self) -> Duration {
        Duration::from_secs(self.affinity_max_age_secs)
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Failures within the window before the circuit opens
    pub failure_threshold: u32,

    /// Rolling window for counting failures
    pub failure_window_secs: u64,

    /// Cooldown before an open circuit grants a half-open probe
    pub cooldown_ms: u64,

    /// Probes granted per cooldown expiry
    pub half_open_max_probes: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            failure_window_secs: 60,
            cooldown_ms: 120_000,
            half_open_max_probes: 1,
        }
    }
}

impl BreakerSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_secs(self.failure_window_secs)
    }
}

/// Defaults applied when an expert-routing classifier config omits a value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_tokens: 100,
            temperature: 0.0,
        }
    }
}

impl ClassifierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl GatewaySettings {
    /// Load settings from environment variables, starting from defaults
    pub fn from_env() -> Result<Self> {
        debug!("Loading routing settings from environment variables");

        let mut settings = Self::default();

        if let Ok(depth) = env::var("MODELGATE_MAX_RESOLVE_DEPTH") {
            settings.routing.max_resolve_depth = depth
                .parse()
                .map_err(|e| GatewayError::Config(format!("Invalid max resolve depth: {}", e)))?;
        }
        if let Ok(window) = env::var("MODELGATE_RETRY_WINDOW_MS") {
            settings.routing.retry_window_ms = window
                .parse()
                .map_err(|e| GatewayError::Config(format!("Invalid retry window: {}", e)))?;
        }
        if let Ok(ttl) = env::var("MODELGATE_AFFINITY_TTL_MS") {
            settings.routing.default_affinity_ttl_ms = ttl
                .parse()
                .map_err(|e| GatewayError::Config(format!("Invalid affinity TTL: {}", e)))?;
        }
        if let Ok(threshold) = env::var("MODELGATE_BREAKER_FAILURE_THRESHOLD") {
            settings.breaker.failure_threshold = threshold
                .parse()
                .map_err(|e| GatewayError::Config(format!("Invalid failure threshold: {}", e)))?;
        }
        if let Ok(cooldown) = env::var("MODELGATE_BREAKER_COOLDOWN_MS") {
            settings.breaker.cooldown_ms = cooldown
                .parse()
                .map_err(|e| GatewayError::Config(format!("Invalid breaker cooldown: {}", e)))?;
        }
        if let Ok(timeout) = env::var("MODELGATE_CLASSIFIER_TIMEOUT_MS") {
            settings.classifier.timeout_ms = timeout
                .parse()
                .map_err(|e| GatewayError::Config(format!("Invalid classifier timeout: {}", e)))?;
        }

        Ok(settings)
    }

    /// Load settings from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading routing settings from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::Config(format!("Failed to read settings file: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse settings: {}", e)))
    }
}
