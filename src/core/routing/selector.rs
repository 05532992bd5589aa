//! Routing target selection
//!
//! Pure selection logic over a parsed routing config: filter targets by
//! circuit availability and the per-request exclusion set, then pick one
//! according to the configured strategy. `None` means no target survived the
//! filter; the caller distinguishes "nothing configured" from "everything
//! unavailable" by checking `config.targets.len()` separately.

use super::config::{HashSource, RoutingConfig, RoutingStrategy, RoutingTarget};
use super::state::RoutingState;
use crate::utils::hash::simple_hash;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

impl RoutingState {
    /// Select one target from a routing config, or `None` when every target
    /// is circuit-open or excluded.
    ///
    /// `config_id` keys the affinity cache; `hash_key` feeds hash mode;
    /// `exclude` carries providers already attempted in this logical request.
    pub fn select_target(
        &self,
        config: &RoutingConfig,
        config_id: Option<&str>,
        hash_key: Option<&str>,
        exclude: Option<&HashSet<String>>,
    ) -> Option<RoutingTarget> {
        if config.targets.is_empty() {
            return None;
        }

        let available: Vec<&RoutingTarget> = config
            .targets
            .iter()
            .filter(|t| self.target_selectable(t, exclude))
            .collect();

        if available.is_empty() {
            warn!(
                total = config.targets.len(),
                excluded = exclude.map(HashSet::len).unwrap_or(0),
                "no routing target available"
            );
            return None;
        }

        match &config.strategy {
            RoutingStrategy::Loadbalance => Some(self.select_loadbalance(&available)),
            RoutingStrategy::Fallback => self.select_fallback(config, exclude),
            RoutingStrategy::Hash { hash_source: _ } => {
                Some(self.select_hash(&available, hash_key))
            }
            RoutingStrategy::Affinity { .. } => {
                Some(self.select_affinity(&available, config_id, config.strategy.affinity_ttl()))
            }
        }
    }

    fn target_selectable(&self, target: &RoutingTarget, exclude: Option<&HashSet<String>>) -> bool {
        self.breaker.is_available(&target.provider)
            && !exclude.is_some_and(|set| set.contains(&target.provider))
    }

    /// Weighted random selection; degenerates to the first available target
    /// when no target carries a positive weight.
    fn select_loadbalance(&self, available: &[&RoutingTarget]) -> RoutingTarget {
        weighted_random(available)
            .unwrap_or_else(|| available[0])
            .clone()
    }

    /// Priority selection over the original declared order. Disabled or
    /// excluded entries are skipped in place; repeated calls under unchanged
    /// state always return the same target.
    fn select_fallback(
        &self,
        config: &RoutingConfig,
        exclude: Option<&HashSet<String>>,
    ) -> Option<RoutingTarget> {
        config
            .targets
            .iter()
            .find(|t| self.target_selectable(t, exclude))
            .cloned()
    }

    /// Deterministic placement: the hash lands in a weight bucket. Same
    /// (key, target set, exclusions) always yields the same target.
    fn select_hash(&self, available: &[&RoutingTarget], hash_key: Option<&str>) -> RoutingTarget {
        let Some(key) = hash_key else {
            warn!("hash routing without a hash key, degrading to first available target");
            return available[0].clone();
        };

        let weighted: Vec<&RoutingTarget> = available
            .iter()
            .copied()
            .filter(|t| t.weight.is_some_and(|w| w > 0))
            .collect();
        let pool: &[&RoutingTarget] = if weighted.is_empty() {
            available
        } else {
            &weighted
        };

        let total_weight: u32 = pool.iter().map(|t| t.weight_or_default()).sum();
        let mut position = simple_hash(key) % total_weight;

        for target in pool {
            let weight = target.weight_or_default();
            if position < weight {
                debug!(provider = %target.provider, "hash routing selected target");
                return (*target).clone();
            }
            position -= weight;
        }

        pool[0].clone()
    }

    /// Sticky selection: honor a fresh cache entry whose provider is still
    /// available, otherwise reselect by weight and overwrite the cache.
    fn select_affinity(
        &self,
        available: &[&RoutingTarget],
        config_id: Option<&str>,
        ttl: Duration,
    ) -> RoutingTarget {
        let Some(config_id) = config_id else {
            return available[0].clone();
        };

        if let Some(provider_id) = self.affinity.fresh_provider(config_id, ttl) {
            if let Some(current) = available.iter().find(|t| t.provider == provider_id) {
                debug!(config_id, provider_id, "affinity routing reused cached provider");
                return (*current).clone();
            }
            info!(
                config_id,
                provider_id, "affinity provider no longer available, reselecting"
            );
        }

        let selected = weighted_random(available)
            .unwrap_or_else(|| available[0])
            .clone();
        self.affinity.record(config_id, &selected.provider);
        info!(
            config_id,
            provider = %selected.provider,
            ttl_secs = ttl.as_secs(),
            "affinity routing selected new provider"
        );
        selected
    }
}

/// Cumulative-weight walk against a random point in `[0, total_weight)`.
///
/// Only targets with a positive weight participate; returns `None` when
/// there are none, letting callers apply their first-available degenerate
/// case.
fn weighted_random<'a>(available: &[&'a RoutingTarget]) -> Option<&'a RoutingTarget> {
    let weighted: Vec<&RoutingTarget> = available
        .iter()
        .copied()
        .filter(|t| t.weight.is_some_and(|w| w > 0))
        .collect();
    if weighted.is_empty() {
        return None;
    }

    let total_weight: u32 = weighted.iter().map(|t| t.weight.unwrap_or(0)).sum();
    let mut point = rand::thread_rng().gen_range(0..total_weight);

    for target in &weighted {
        let weight = target.weight.unwrap_or(0);
        if point < weight {
            return Some(*target);
        }
        point -= weight;
    }

    Some(weighted[0])
}
