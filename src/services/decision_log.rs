//! Routing decision log
//!
//! Expert-routing decisions and circuit-breaker trips are reported to a
//! [`DecisionLogger`] for observability. Logging is strictly best-effort:
//! callers go through [`log_decision_best_effort`] /
//! [`log_trigger_best_effort`], which swallow and warn on sink failures so a
//! broken log store can never fail a routing decision.

use crate::core::breaker::BreakerTransition;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

/// One expert-routing decision
#[derive(Debug, Clone)]
pub struct RoutingDecisionRecord {
    pub id: String,
    pub virtual_key_id: Option<String>,
    pub expert_routing_id: String,
    /// Hash of the classified request content
    pub request_hash: String,
    /// "provider/model" of the classifier, or "fallback"
    pub classifier_model: String,
    /// Raw classifier reply, or a marker for degraded decisions
    pub classifier_response: String,
    /// Category the classifier produced (or "fallback")
    pub category: String,
    pub expert_id: String,
    pub expert_kind: String,
    pub expert_name: String,
    /// Where the decision came from: "llm" or "fallback"
    pub route_source: String,
    pub classification_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl RoutingDecisionRecord {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Best-effort sink for routing-decision and breaker-trigger events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionLogger: Send + Sync {
    async fn log_decision(&self, record: RoutingDecisionRecord) -> anyhow::Result<()>;

    async fn log_breaker_trigger(&self, transition: BreakerTransition) -> anyhow::Result<()>;
}

/// Write a decision record, demoting failures to a warning
pub async fn log_decision_best_effort(logger: &dyn DecisionLogger, record: RoutingDecisionRecord) {
    if let Err(e) = logger.log_decision(record).await {
        warn!(error = %e, "failed to write routing decision log");
    }
}

/// Report a breaker trip, demoting failures to a warning
pub async fn log_trigger_best_effort(logger: &dyn DecisionLogger, transition: BreakerTransition) {
    if let Err(e) = logger.log_breaker_trigger(transition).await {
        warn!(error = %e, "failed to persist circuit breaker trigger");
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDecisionLogger;

#[async_trait]
impl DecisionLogger for NoopDecisionLogger {
    async fn log_decision(&self, _record: RoutingDecisionRecord) -> anyhow::Result<()> {
        Ok(())
    }

    async fn log_breaker_trigger(&self, _transition: BreakerTransition) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Keeps records in memory; used by tests and local inspection
#[derive(Debug, Default)]
pub struct MemoryDecisionLogger {
    decisions: Mutex<Vec<RoutingDecisionRecord>>,
    triggers: Mutex<Vec<BreakerTransition>>,
}

impl MemoryDecisionLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decisions(&self) -> Vec<RoutingDecisionRecord> {
        self.decisions.lock().clone()
    }

    pub fn triggers(&self) -> Vec<BreakerTransition> {
        self.triggers.lock().clone()
    }
}

#[async_trait]
impl DecisionLogger for MemoryDecisionLogger {
    async fn log_decision(&self, record: RoutingDecisionRecord) -> anyhow::Result<()> {
        self.decisions.lock().push(record);
        Ok(())
    }

    async fn log_breaker_trigger(&self, transition: BreakerTransition) -> anyhow::Result<()> {
        self.triggers.lock().push(transition);
        Ok(())
    }
}
