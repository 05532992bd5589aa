//! Crate-wide error types
//!
//! This module defines the routing error taxonomy and its mapping to
//! HTTP-facing status classes. Fatal configuration errors surface to the
//! proxy handler as 500-class failures; `AllTargetsUnavailable` is the one
//! transient, retry-later (503) case. Classification errors are normally
//! intercepted by the expert router's fallback path and only propagate when
//! no fallback is configured.

use crate::storage::StoreError;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Routing engine error taxonomy
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or corrupt routing / expert-routing configuration
    #[error("routing config error: {0}")]
    Config(String),

    /// Routing config exists but declares zero targets
    #[error("routing config has no targets: {0}")]
    NoTargetsConfigured(String),

    /// Targets exist but every provider is circuit-open or excluded
    #[error("all routing targets unavailable for config: {0}")]
    AllTargetsUnavailable(String),

    /// Classifier transport, timeout, or parse failure
    #[error("classification failed: {0}")]
    ClassificationFailed(String),

    /// Classifier produced a category no expert maps to
    #[error("no expert matched category: {0:?}")]
    NoExpertMatched(String),

    /// Cyclic virtual-model chain exceeded the resolution depth bound
    #[error("maximum routing depth exceeded at depth {depth} (possible circular reference)")]
    MaxDepthExceeded { depth: u8 },

    /// Dangling provider reference
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// Dangling model reference
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Plain model binding without a provider id
    #[error("model has no provider configured: {0}")]
    ModelHasNoProvider(String),

    /// Expert routing config missing or disabled; the resolver treats this
    /// as "no expert routing applies" and falls through
    #[error("expert routing config not found or disabled: {0}")]
    ExpertRoutingUnavailable(String),

    /// Upstream attempt failed and no further target was available
    #[error("upstream request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Config store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GatewayError {
    /// HTTP status class the proxy handler should map this error to
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::AllTargetsUnavailable(_) => 503,
            GatewayError::Upstream { status, .. } => *status,
            _ => 500,
        }
    }

    /// Whether the expert router may redirect this error into its fallback
    /// path instead of propagating it
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GatewayError::ClassificationFailed(_) | GatewayError::NoExpertMatched(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_targets_unavailable_maps_to_503() {
        let err = GatewayError::AllTargetsUnavailable("rc-1".to_string());
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn test_upstream_error_keeps_its_status() {
        let err = GatewayError::Upstream {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.http_status(), 429);
    }

    #[test]
    fn test_config_errors_map_to_500() {
        assert_eq!(GatewayError::Config("bad".into()).http_status(), 500);
        assert_eq!(
            GatewayError::NoTargetsConfigured("rc-1".into()).http_status(),
            500
        );
        assert_eq!(
            GatewayError::MaxDepthExceeded { depth: 6 }.http_status(),
            500
        );
        assert_eq!(
            GatewayError::ProviderNotFound("p1".into()).http_status(),
            500
        );
    }

    #[test]
    fn test_recoverable_variants() {
        assert!(GatewayError::ClassificationFailed("timeout".into()).is_recoverable());
        assert!(GatewayError::NoExpertMatched("poetry".into()).is_recoverable());
        assert!(!GatewayError::Config("bad".into()).is_recoverable());
        assert!(!GatewayError::AllTargetsUnavailable("rc-1".into()).is_recoverable());
    }
}
