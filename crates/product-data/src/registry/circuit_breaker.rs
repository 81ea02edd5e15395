//! Circuit breaker guarding the source chain as a whole.
//!
//! Implements the circuit breaker pattern so that an upstream outage stops
//! lookups from walking every source on every call. The circuit has three
//! states:
//!
//! - **Closed**: Normal operation, lookups are allowed through.
//! - **Open**: Recent lookups failed; lookups are rejected until the cooldown
//!   has elapsed.
//! - **HalfOpen**: One trial lookup is in flight; its result decides whether
//!   the circuit closes or reopens.
//!
//! There is no background timer: the Open -> HalfOpen transition happens in
//! [`CircuitBreaker::allow`] on the first call after the cooldown.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::clock::{elapsed_between, Clock};

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - lookups are allowed.
    Closed,
    /// Upstream is failing - lookups are rejected.
    Open,
    /// Testing recovery - a single trial lookup is allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    /// Consecutive failures while closed.
    consecutive_failures: u32,
    /// When the circuit last opened. Set whenever `state == Open`.
    opened_at: Option<DateTime<Utc>>,
    /// A half-open trial has been let through and has not reported back.
    trial_in_flight: bool,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
    }
}

/// Admission ticket returned by [`CircuitBreaker::allow`].
///
/// Carries whether the admitted lookup is the half-open trial, so that only
/// the trial's outcome decides whether a HalfOpen circuit closes or reopens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Permit {
    trial: bool,
}

impl Permit {
    pub fn is_trial(&self) -> bool {
        self.trial
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before a trial lookup.
    pub cooldown: Duration,
}

/// Point-in-time view of the breaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<DateTime<Utc>>,
}

/// Thread-safe circuit breaker.
///
/// State is in-memory and owned by the lookup service instance.
pub struct CircuitBreaker {
    circuit: Mutex<Circuit>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            circuit: Mutex::new(Circuit::new()),
            config,
            clock,
        }
    }

    /// Lock the circuit mutex, recovering from poison if necessary.
    ///
    /// For circuit breakers, it's safe to recover from a poisoned mutex since
    /// the worst case is slightly incorrect circuit state, which is better
    /// than panicking.
    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Check whether a lookup may reach the source chain.
    ///
    /// - Closed: always admitted.
    /// - Open: rejected until the cooldown has elapsed; the first call after
    ///   that moves the circuit to HalfOpen and is admitted as the trial.
    /// - HalfOpen: rejected while the trial is outstanding.
    ///
    /// The returned permit must be handed back to
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn allow(&self) -> Option<Permit> {
        let mut circuit = self.lock_circuit();

        match circuit.state {
            CircuitState::Closed => Some(Permit { trial: false }),
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight {
                    None
                } else {
                    circuit.trial_in_flight = true;
                    Some(Permit { trial: true })
                }
            }
            CircuitState::Open => {
                let now = self.clock.now();
                let cooled_down = circuit
                    .opened_at
                    .map(|opened| elapsed_between(opened, now) >= self.config.cooldown)
                    .unwrap_or(true);

                if cooled_down {
                    info!("Circuit breaker: transitioning from Open to HalfOpen");
                    circuit.state = CircuitState::HalfOpen;
                    circuit.trial_in_flight = true;
                    Some(Permit { trial: true })
                } else {
                    None
                }
            }
        }
    }

    /// Record a lookup that reached the sources and got an answer.
    ///
    /// In Closed state the failure count is reset. Only the trial closes a
    /// HalfOpen circuit; late answers from lookups admitted before the circuit
    /// opened are ignored while it is Open or HalfOpen.
    pub fn record_success(&self, permit: Permit) {
        let mut circuit = self.lock_circuit();

        match (circuit.state, permit.trial) {
            (CircuitState::Closed, _) => {
                if circuit.consecutive_failures > 0 {
                    debug!(
                        "Circuit breaker: success after {} failures, count reset",
                        circuit.consecutive_failures
                    );
                }
                circuit.consecutive_failures = 0;
            }
            (CircuitState::HalfOpen, true) => {
                info!("Circuit breaker: trial succeeded, closing circuit");
                *circuit = Circuit::new();
            }
            (state, _) => {
                debug!("Circuit breaker: ignoring late success while {}", state);
            }
        }
    }

    /// Record a lookup for which no source could answer.
    ///
    /// In Closed state the failure count grows and may open the circuit.
    /// A failed trial reopens a HalfOpen circuit with a fresh cooldown; other
    /// late failures are ignored while the circuit is Open or HalfOpen.
    pub fn record_failure(&self, permit: Permit) {
        let mut circuit = self.lock_circuit();
        let now = self.clock.now();

        match (circuit.state, permit.trial) {
            (CircuitState::Closed, _) => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    info!(
                        "Circuit breaker: opening circuit after {} consecutive failures",
                        circuit.consecutive_failures
                    );
                    circuit.open(now);
                } else {
                    debug!(
                        "Circuit breaker: failure ({}/{})",
                        circuit.consecutive_failures, self.config.failure_threshold
                    );
                }
            }
            (CircuitState::HalfOpen, true) => {
                info!("Circuit breaker: trial failed, reopening circuit");
                circuit.open(now);
            }
            (state, _) => {
                debug!("Circuit breaker: ignoring late failure while {}", state);
            }
        }
    }

    /// Time left before the next trial is allowed, if the circuit is open.
    pub fn retry_after(&self) -> Option<Duration> {
        let circuit = self.lock_circuit();

        match (circuit.state, circuit.opened_at) {
            (CircuitState::Open, Some(opened)) => {
                let elapsed = elapsed_between(opened, self.clock.now());
                Some(self.config.cooldown.saturating_sub(elapsed))
            }
            (CircuitState::HalfOpen, _) => Some(Duration::ZERO),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let circuit = self.lock_circuit();

        CircuitSnapshot {
            state: circuit.state,
            consecutive_failures: circuit.consecutive_failures,
            opened_at: circuit.opened_at,
        }
    }

    /// Reset the circuit to Closed.
    pub fn reset(&self) {
        *self.lock_circuit() = Circuit::new();
        info!("Circuit breaker: manually reset");
    }
}
