//! Cross-target retry coordination
//!
//! One logical client request may be attempted against several smart-routing
//! targets. The coordinator owns the growing exclusion set, the retry-window
//! clock, and the decision of whether a failed attempt earns another target;
//! [`execute_with_failover`] drives the full attempt loop around a
//! caller-supplied upstream operation, recording every outcome on the
//! circuit breaker.

use super::resolver::ProviderResolver;
use crate::core::types::{ModelRecord, ProxyRequest, Resolution};
use crate::services::decision_log::{DecisionLogger, log_trigger_best_effort};
use crate::utils::error::{GatewayError, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Status codes that make a failed target eligible for another target.
///
/// 400 and 404 are included deliberately: several providers signal "bad
/// combination for this target" with client-error codes, so they are treated
/// as target-level failures rather than unfixable client errors.
pub const RETRYABLE_STATUS_CODES: [u16; 8] = [400, 404, 429, 472, 500, 502, 503, 504];

/// Whether a failed upstream status earns a retry against another target
pub fn should_retry_status(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

/// A failed upstream attempt, normalized to a status code
#[derive(Debug, Clone)]
pub struct UpstreamFailure {
    pub status: u16,
    pub message: String,
}

/// Tracks the exclusion set and retry eligibility for one logical request
#[derive(Debug)]
pub struct RetryCoordinator {
    model_id: String,
    exclusions: HashSet<String>,
    can_retry: bool,
    window: Duration,
    started: Instant,
}

impl RetryCoordinator {
    /// Build from the initial resolution. Retries are only possible when the
    /// original resolution was smart routing on a virtual model and produced
    /// a non-empty exclusion set — expert routes and plain bindings have
    /// nothing to fail over to.
    pub fn new(model: &ModelRecord, resolution: &Resolution, window: Duration) -> Self {
        let exclusions = resolution.exclude_providers.clone().unwrap_or_default();
        let can_retry =
            model.is_virtual && model.routing_config_id.is_some() && !exclusions.is_empty();

        Self {
            model_id: model.id.clone(),
            exclusions,
            can_retry,
            window,
            started: Instant::now(),
        }
    }

    pub fn can_retry(&self) -> bool {
        self.can_retry
    }

    /// Providers attempted so far
    pub fn attempted(&self) -> usize {
        self.exclusions.len()
    }

    /// Decide whether the failed attempt earns another target, and resolve
    /// it. Returns `None` when retrying is not possible: the caller
    /// surfaces the last upstream error.
    pub async fn next_target(
        &mut self,
        resolver: &ProviderResolver,
        request: &mut ProxyRequest,
        virtual_key_id: Option<&str>,
        status: u16,
    ) -> Option<Resolution> {
        if !self.can_retry {
            debug!("retry not supported: resolution was not smart-routed");
            return None;
        }
        if self.started.elapsed() > self.window {
            warn!(
                window_ms = self.window.as_millis() as u64,
                "smart routing retry stopped: retry window exceeded"
            );
            return None;
        }
        if !should_retry_status(status) {
            debug!(status, "status code is not retryable");
            return None;
        }

        info!(
            status,
            attempted = self.exclusions.len(),
            "smart routing retry: selecting next target"
        );

        match resolver
            .resolve_retry(&self.model_id, request, virtual_key_id, &self.exclusions)
            .await
        {
            Ok(resolution) => {
                if let Some(exclusions) = &resolution.exclude_providers {
                    self.exclusions = exclusions.clone();
                }
                info!(
                    provider = %resolution.provider.name,
                    "smart routing retry: switched to new target"
                );
                Some(resolution)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    attempted = self.exclusions.len(),
                    "smart routing retry failed: no more available targets"
                );
                None
            }
        }
    }
}

/// Drive one logical request through resolution, upstream attempts, breaker
/// recording, and cross-target retries.
///
/// `operation` receives the resolution and a snapshot of the (possibly
/// rewritten) request body for each attempt. On success the breaker records
/// it and the value is returned; on failure the breaker records it (breaker
/// trips are reported to the decision logger best-effort) and the
/// coordinator decides whether another target gets a try. When no further
/// target is available, the last upstream failure surfaces.
pub async fn execute_with_failover<T, F, Fut>(
    resolver: &ProviderResolver,
    model: &ModelRecord,
    request: &mut ProxyRequest,
    virtual_key_id: Option<&str>,
    logger: &dyn DecisionLogger,
    operation: F,
) -> Result<T>
where
    F: Fn(Resolution, Value) -> Fut,
    Fut: Future<Output = std::result::Result<T, UpstreamFailure>>,
{
    let resolution = resolver.resolve(model, request, virtual_key_id).await?;
    let mut coordinator = RetryCoordinator::new(model, &resolution, resolver.retry_window());
    let mut current = resolution;

    loop {
        match operation(current.clone(), request.body.clone()).await {
            Ok(value) => {
                resolver.state().breaker.record_success(&current.provider_id);
                return Ok(value);
            }
            Err(failure) => {
                let transition = resolver
                    .state()
                    .breaker
                    .record_failure(&current.provider_id, Some(&failure.message));
                if let Some(transition) = transition {
                    log_trigger_best_effort(logger, transition).await;
                }

                match coordinator
                    .next_target(resolver, request, virtual_key_id, failure.status)
                    .await
                {
                    Some(next) => {
                        current = next;
                    }
                    None => {
                        return Err(GatewayError::Upstream {
                            status: failure.status,
                            message: failure.message,
                        });
                    }
                }
            }
        }
    }
}
