//! Shared routing state
//!
//! The circuit breaker and affinity cache are the two pieces of
//! time-windowed mutable state the selector consults. They are bundled in an
//! injectable, lifetime-scoped value instead of process-wide globals so
//! every gateway (and every test) owns isolated state.

use super::affinity::AffinityCache;
use crate::config::GatewaySettings;
use crate::core::breaker::CircuitBreaker;
use std::sync::Arc;

/// Breaker + affinity bundle injected into the resolver
#[derive(Debug)]
pub struct RoutingState {
    pub breaker: CircuitBreaker,
    pub affinity: Arc<AffinityCache>,
}

impl RoutingState {
    pub fn new(settings: &GatewaySettings) -> Self {
        Self {
            breaker: CircuitBreaker::new(settings.breaker.clone()),
            affinity: Arc::new(AffinityCache::new()),
        }
    }

    /// Spawn the affinity sweep task with the configured cadence
    pub fn start_background_tasks(&self, settings: &GatewaySettings) -> tokio::task::JoinHandle<()> {
        self.affinity.clone().start_sweep_task(
            settings.routing.affinity_sweep_interval(),
            settings.routing.affinity_max_age(),
        )
    }
}

impl Default for RoutingState {
    fn default() -> Self {
        Self::new(&GatewaySettings::default())
    }
}
