//! Per-provider circuit breaker
//!
//! The breaker is the health gate in front of every routing target: a
//! provider that keeps failing transitions Closed → Open and stops being
//! selectable until its cooldown expires, at which point a bounded number of
//! half-open probes may go through. State is per-provider, created lazily on
//! the first recorded event, lives for the process lifetime, and is never
//! persisted.
//!
//! The breaker itself is synchronous and never performs I/O. Open
//! transitions are reported back to the caller as [`BreakerTransition`]
//! events so an async caller can forward them to the decision logger
//! best-effort; the breaker also keeps its own trigger counters for stats.

use crate::config::BreakerSettings;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Circuit state for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-provider breaker bookkeeping
#[derive(Debug)]
struct ProviderCircuit {
    state: CircuitState,
    failures: u32,
    last_failure_at: Option<Instant>,
    last_state_change: Instant,
    half_open_probes: u32,
    trigger_count: u64,
}

impl ProviderCircuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            last_failure_at: None,
            last_state_change: Instant::now(),
            half_open_probes: 0,
            trigger_count: 0,
        }
    }
}

/// Snapshot of one provider's breaker state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCircuitStats {
    pub state: CircuitState,
    pub failures: u32,
    pub trigger_count: u64,
}

/// Aggregate trigger statistics across all providers
#[derive(Debug, Clone, Default)]
pub struct GlobalBreakerStats {
    pub total_triggers: u64,
    pub max_triggered_provider: Option<String>,
    pub max_trigger_count: u64,
}

/// Emitted on every Closed→Open or HalfOpen→Open transition
#[derive(Debug, Clone)]
pub struct BreakerTransition {
    pub provider_id: String,
    /// Trigger count after this transition
    pub trigger_count: u64,
    /// Failures recorded in the current window at trip time
    pub failures: u32,
}

/// Per-provider failure-tracking gate
#[derive(Debug)]
pub struct CircuitBreaker {
    circuits: DashMap<String, Mutex<ProviderCircuit>>,
    settings: BreakerSettings,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            circuits: DashMap::new(),
            settings,
        }
    }

    /// Whether a provider may be selected right now.
    ///
    /// Closed circuits are always available. An open circuit becomes
    /// half-open once its cooldown has elapsed and grants a bounded number
    /// of probes (one by default). Unknown providers are available — the
    /// optimistic default — and no state is created for them here.
    pub fn is_available(&self, provider_id: &str) -> bool {
        let Some(entry) = self.circuits.get(provider_id) else {
            return true;
        };
        let mut circuit = entry.lock();

        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if circuit.last_state_change.elapsed() >= self.settings.cooldown() {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.last_state_change = Instant::now();
                    circuit.half_open_probes = 1;
                    info!(provider_id, "circuit breaker entering half-open state");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if circuit.half_open_probes < self.settings.half_open_max_probes {
                    circuit.half_open_probes += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful upstream call: the failure counter resets and the
    /// circuit closes regardless of its previous state.
    pub fn record_success(&self, provider_id: &str) {
        let entry = self
            .circuits
            .entry(provider_id.to_string())
            .or_insert_with(|| Mutex::new(ProviderCircuit::new()));
        let mut circuit = entry.lock();

        if circuit.state != CircuitState::Closed {
            info!(provider_id, "circuit breaker recovered, closing");
        }
        circuit.state = CircuitState::Closed;
        circuit.failures = 0;
        circuit.half_open_probes = 0;
        circuit.last_state_change = Instant::now();
    }

    /// Record a failed upstream call.
    ///
    /// Failures are counted within a rolling window; a failure landing after
    /// the window has elapsed restarts the count. Crossing the threshold
    /// opens the circuit; any failure in half-open state reopens it. Returns
    /// the transition event when the circuit opened, for best-effort
    /// observability reporting by the caller.
    pub fn record_failure(&self, provider_id: &str, error: Option<&str>) -> Option<BreakerTransition> {
        let entry = self
            .circuits
            .entry(provider_id.to_string())
            .or_insert_with(|| Mutex::new(ProviderCircuit::new()));
        let mut circuit = entry.lock();

        let window_expired = circuit
            .last_failure_at
            .is_some_and(|at| at.elapsed() > self.settings.failure_window());
        if window_expired {
            circuit.failures = 0;
        }
        circuit.failures += 1;
        circuit.last_failure_at = Some(Instant::now());

        match circuit.state {
            CircuitState::HalfOpen => {
                circuit.state = CircuitState::Open;
                circuit.half_open_probes = 0;
                circuit.last_state_change = Instant::now();
                circuit.trigger_count += 1;
                warn!(
                    provider_id,
                    error = error.unwrap_or("unknown"),
                    "circuit breaker reopened after failed half-open probe"
                );
                Some(BreakerTransition {
                    provider_id: provider_id.to_string(),
                    trigger_count: circuit.trigger_count,
                    failures: circuit.failures,
                })
            }
            CircuitState::Closed if circuit.failures >= self.settings.failure_threshold => {
                circuit.state = CircuitState::Open;
                circuit.last_state_change = Instant::now();
                circuit.trigger_count += 1;
                warn!(
                    provider_id,
                    failures = circuit.failures,
                    error = error.unwrap_or("unknown"),
                    "circuit breaker opened"
                );
                Some(BreakerTransition {
                    provider_id: provider_id.to_string(),
                    trigger_count: circuit.trigger_count,
                    failures: circuit.failures,
                })
            }
            _ => None,
        }
    }

    /// Current state for a provider (Closed for unknown providers)
    pub fn state(&self, provider_id: &str) -> CircuitState {
        self.circuits
            .get(provider_id)
            .map(|entry| entry.lock().state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Stats snapshot for a provider (zeroed for unknown providers)
    pub fn provider_stats(&self, provider_id: &str) -> ProviderCircuitStats {
        self.circuits
            .get(provider_id)
            .map(|entry| {
                let circuit = entry.lock();
                ProviderCircuitStats {
                    state: circuit.state,
                    failures: circuit.failures,
                    trigger_count: circuit.trigger_count,
                }
            })
            .unwrap_or(ProviderCircuitStats {
                state: CircuitState::Closed,
                failures: 0,
                trigger_count: 0,
            })
    }

    /// Aggregate trigger counts across all tracked providers
    pub fn global_stats(&self) -> GlobalBreakerStats {
        let mut stats = GlobalBreakerStats::default();
        for entry in self.circuits.iter() {
            let count = entry.value().lock().trigger_count;
            stats.total_triggers += count;
            if count > stats.max_trigger_count {
                stats.max_trigger_count = count;
                stats.max_triggered_provider = Some(entry.key().clone());
            }
        }
        stats
    }

    /// Drop all state for one provider
    pub fn reset(&self, provider_id: &str) {
        self.circuits.remove(provider_id);
        debug!(provider_id, "circuit breaker reset");
    }

    /// Drop all breaker state
    pub fn reset_all(&self) {
        self.circuits.clear();
        debug!("all circuit breakers reset");
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}
