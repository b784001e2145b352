//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast to the fallback
//! - Half-Open: a single probe is testing whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: open_duration elapsed, next caller becomes the probe
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (opened_at reset)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency name, held in an explicit [`BreakerRegistry`]
//! - Admission and the Open → Half-Open transition happen under one lock, so two
//!   callers can never both become the probe
//! - An [`Admission`] is a guard: a probe dropped before it settles puts the
//!   breaker back into Open instead of leaving it half-open forever

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::error::BreakerOpen;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Thresholds for one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_duration: Duration,
}

impl BreakerSettings {
    pub fn new(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            open_duration,
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let config = CircuitBreakerConfig::default();
        Self::new(config.failure_threshold, Duration::from_secs(config.open_duration_secs))
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: bool,
}

/// Point-in-time view of a breaker, as exposed on the actuator endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub open_duration_ms: u64,
    pub half_open_in_flight: bool,
}

/// Per-dependency circuit breaker, shared by every concurrent caller.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, CircuitState::Closed);
        Self {
            name,
            settings,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                half_open_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> BreakerSettings {
        self.settings
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.lock().opened_at
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Decide whether a call may reach the dependency.
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and admits
    /// the caller as its single probe.
    pub fn try_acquire(self: &Arc<Self>, now: Instant) -> Result<Admission, BreakerOpen> {
        let mut inner = self.lock();
        let probe = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|opened| now.saturating_duration_since(opened))
                    .unwrap_or(Duration::MAX);
                if elapsed < self.settings.open_duration {
                    return Err(self.rejection());
                }
                inner.state = CircuitState::HalfOpen;
                inner.half_open_in_flight = true;
                true
            }
            // Either a probe is in flight or the probe slot is unaccounted for;
            // both reject.
            CircuitState::HalfOpen => return Err(self.rejection()),
        };
        drop(inner);

        if probe {
            self.transitioned(CircuitState::Open, CircuitState::HalfOpen);
        }
        Ok(Admission {
            breaker: Arc::clone(self),
            probe,
            settled: false,
        })
    }

    fn record_success(&self, probe: bool) {
        let mut inner = self.lock();
        // A straggler admitted before the circuit opened must not clear the
        // failures that opened it.
        if probe || inner.state == CircuitState::Closed {
            inner.failure_count = 0;
        }
        let closed = probe && inner.state == CircuitState::HalfOpen;
        if closed {
            inner.state = CircuitState::Closed;
            inner.half_open_in_flight = false;
            inner.opened_at = None;
        }
        drop(inner);

        if closed {
            self.transitioned(CircuitState::HalfOpen, CircuitState::Closed);
        }
    }

    fn record_failure(&self, probe: bool, now: Instant) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        let from = inner.state;
        let opened = match inner.state {
            CircuitState::HalfOpen if probe => true,
            CircuitState::Closed => inner.failure_count >= self.settings.failure_threshold,
            _ => false,
        };
        if opened {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            inner.half_open_in_flight = false;
        }
        let failures = inner.failure_count;
        drop(inner);

        if opened {
            tracing::warn!(
                dependency = %self.name,
                failures,
                threshold = self.settings.failure_threshold,
                "Circuit opened"
            );
            self.transitioned(from, CircuitState::Open);
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.settings.failure_threshold,
            open_duration_ms: u64::try_from(self.settings.open_duration.as_millis())
                .unwrap_or(u64::MAX),
            half_open_in_flight: inner.half_open_in_flight,
        }
    }

    fn rejection(&self) -> BreakerOpen {
        BreakerOpen {
            dependency: self.name.clone(),
        }
    }

    fn transitioned(&self, from: CircuitState, to: CircuitState) {
        tracing::info!(
            dependency = %self.name,
            from = from.as_str(),
            to = to.as_str(),
            "Circuit breaker transition"
        );
        metrics::record_breaker_transition(&self.name, from, to);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }
}

/// Permission to call the dependency once.
///
/// Must be settled with [`Admission::succeed`] or [`Admission::fail`]. Dropping an
/// unsettled probe counts as a failed probe.
#[derive(Debug)]
pub struct Admission {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    settled: bool,
}

impl Admission {
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(self.probe);
    }

    pub fn fail(mut self, now: Instant) {
        self.settled = true;
        self.breaker.record_failure(self.probe, now);
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            tracing::debug!(dependency = %self.breaker.name, "Probe abandoned before completion");
            self.breaker.record_failure(true, Instant::now());
        }
    }
}

/// Map from dependency name to its breaker.
///
/// Owned by whoever builds the outbound guards; tests build isolated registries.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    defaults: BreakerSettings,
    overrides: HashMap<String, BreakerSettings>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(defaults: BreakerSettings) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
            breakers: DashMap::new(),
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        let defaults = BreakerSettings::new(
            config.failure_threshold,
            Duration::from_secs(config.open_duration_secs),
        );
        let mut registry = Self::new(defaults);
        for (name, over) in &config.overrides {
            let settings = BreakerSettings::new(
                over.failure_threshold.unwrap_or(config.failure_threshold),
                Duration::from_secs(over.open_duration_secs.unwrap_or(config.open_duration_secs)),
            );
            registry = registry.with_override(name.clone(), settings);
        }
        registry
    }

    pub fn with_override(mut self, dependency: impl Into<String>, settings: BreakerSettings) -> Self {
        self.overrides.insert(dependency.into(), settings);
        self
    }

    /// The breaker for `dependency`, created on first use.
    pub fn get(&self, dependency: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(dependency) {
            return Arc::clone(existing.value());
        }
        let settings = self.overrides.get(dependency).copied().unwrap_or(self.defaults);
        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(dependency, settings)))
            .value()
            .clone()
    }

    /// Snapshots of every breaker created so far, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut all: Vec<_> = self.breakers.iter().map(|b| b.value().snapshot()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
