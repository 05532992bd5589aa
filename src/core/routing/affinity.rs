//! Affinity cache for sticky routing
//!
//! Affinity mode pins a routing config to one provider for a TTL. The cache
//! is a soft locality optimization, not a correctness property: concurrent
//! reselections race with last-writer-wins semantics, which is acceptable.
//! A periodic sweep purges entries past a fixed max age regardless of their
//! per-config TTL, bounding memory over the process lifetime.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One sticky selection: provider plus when it was made
#[derive(Debug, Clone)]
pub struct AffinityEntry {
    pub provider_id: String,
    pub selected_at: Instant,
}

/// TTL-keyed sticky-routing state, keyed by routing-config id
#[derive(Debug, Default)]
pub struct AffinityCache {
    entries: DashMap<String, AffinityEntry>,
}

impl AffinityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached provider for a config, if the entry is younger than `ttl`.
    ///
    /// Expired entries are left in place; they are overwritten on
    /// reselection and reaped by the sweep.
    pub fn fresh_provider(&self, config_id: &str, ttl: Duration) -> Option<String> {
        let entry = self.entries.get(config_id)?;
        if entry.selected_at.elapsed() < ttl {
            Some(entry.provider_id.clone())
        } else {
            None
        }
    }

    /// Record a (re)selection with a fresh timestamp
    pub fn record(&self, config_id: &str, provider_id: &str) {
        self.entries.insert(
            config_id.to_string(),
            AffinityEntry {
                provider_id: provider_id.to_string(),
                selected_at: Instant::now(),
            },
        );
        debug!(config_id, provider_id, "affinity selection recorded");
    }

    /// Purge entries older than `max_age`; returns how many were removed
    pub fn sweep(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.selected_at.elapsed() <= max_age);
        let removed = before - self.entries.len();
        if removed > 0 {
            info!(removed, "swept expired affinity entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn the periodic sweep task
    pub fn start_sweep_task(
        self: Arc<Self>,
        interval: Duration,
        max_age: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep(max_age);
            }
        })
    }
}
