//! Circuit breaker registry
//!
//! Tracks a three-state breaker per operation name:
//! - `Closed` -> `Open`: failure count reaches the threshold
//! - `Open` -> `HalfOpen`: on the next admission check once the reset timeout has passed
//! - `HalfOpen` -> `Open`: any failure
//! - `HalfOpen` -> `Closed`: `success_threshold` consecutive successes
//!
//! The `Open` -> `HalfOpen` move is evaluated lazily in [`CircuitBreakerRegistry::admit`];
//! there is no background timer, so a breaker that sees no further traffic stays `Open`.

use crate::clock::{elapsed_since, Clock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

/// Breaker tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Time the breaker stays open before allowing a trial call
    pub reset_timeout: Duration,
    /// Consecutive half-open successes required to close
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            success_threshold: 3,
        }
    }
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally
    Closed,
    /// Calls fail fast
    Open,
    /// Trial calls allowed to probe recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Per-operation breaker bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BreakerEntry {
    failure_count: u32,
    last_failure: Option<SystemTime>,
    state: CircuitState,
    half_open_successes: u32,
}

impl BreakerEntry {
    fn new() -> Self {
        Self {
            failure_count: 0,
            last_failure: None,
            state: CircuitState::Closed,
            half_open_successes: 0,
        }
    }
}

/// Snapshot of one breaker for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitStatus {
    pub state: CircuitState,
    pub failures: u32,
    pub last_failure: Option<SystemTime>,
}

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Call may proceed; carries the state it proceeds under
    Allowed(CircuitState),
    /// Breaker is open; carries the failure count
    Rejected { failures: u32 },
}

/// Registry of breakers keyed by operation name
///
/// Entries are created lazily on first use and live until reset.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, BreakerEntry>>,
}

impl CircuitBreakerRegistry {
    /// Create a registry with the given tuning
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Breaker tuning in effect
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BreakerEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether a call to `operation` may proceed
    ///
    /// Moves an open breaker to half-open when the reset timeout has strictly elapsed.
    pub fn admit(&self, operation: &str) -> Admission {
        let now = self.clock.now();
        let mut entries = self.lock();
        let entry = entries
            .entry(operation.to_string())
            .or_insert_with(BreakerEntry::new);

        match entry.state {
            CircuitState::Closed | CircuitState::HalfOpen => Admission::Allowed(entry.state),
            CircuitState::Open => {
                let expired = entry
                    .last_failure
                    .map(|at| elapsed_since(now, at) > self.config.reset_timeout)
                    .unwrap_or(true);

                if expired {
                    entry.state = CircuitState::HalfOpen;
                    entry.half_open_successes = 0;
                    log::info!("Circuit '{}' half-open, allowing trial call", operation);
                    Admission::Allowed(CircuitState::HalfOpen)
                } else {
                    Admission::Rejected {
                        failures: entry.failure_count,
                    }
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self, operation: &str) {
        let mut entries = self.lock();
        let entry = entries
            .entry(operation.to_string())
            .or_insert_with(BreakerEntry::new);

        match entry.state {
            CircuitState::Closed => {
                entry.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                entry.half_open_successes += 1;
                if entry.half_open_successes >= self.config.success_threshold {
                    entry.state = CircuitState::Closed;
                    entry.failure_count = 0;
                    entry.half_open_successes = 0;
                    log::info!("Circuit '{}' closed after recovery", operation);
                }
            }
            // A call admitted before the breaker opened finished late
            CircuitState::Open => {
                log::debug!("Ignoring late success for open circuit '{}'", operation);
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self, operation: &str) {
        let now = self.clock.now();
        let mut entries = self.lock();
        let entry = entries
            .entry(operation.to_string())
            .or_insert_with(BreakerEntry::new);

        entry.failure_count = entry.failure_count.saturating_add(1);
        entry.last_failure = Some(now);

        match entry.state {
            CircuitState::Closed => {
                if entry.failure_count >= self.config.failure_threshold {
                    entry.state = CircuitState::Open;
                    log::warn!(
                        "Circuit '{}' opened after {} consecutive failures",
                        operation,
                        entry.failure_count
                    );
                }
            }
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
                entry.half_open_successes = 0;
                log::warn!("Circuit '{}' re-opened by failed trial call", operation);
            }
            CircuitState::Open => {}
        }
    }

    /// Current state of one breaker, `Closed` if never used
    ///
    /// Does not perform the lazy half-open transition.
    pub fn state(&self, operation: &str) -> CircuitState {
        self.lock()
            .get(operation)
            .map(|e| e.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Status of every known breaker
    pub fn status(&self) -> BTreeMap<String, CircuitStatus> {
        self.lock()
            .iter()
            .map(|(name, e)| {
                (
                    name.clone(),
                    CircuitStatus {
                        state: e.state,
                        failures: e.failure_count,
                        last_failure: e.last_failure,
                    },
                )
            })
            .collect()
    }

    /// Forget one breaker; returns whether it existed
    pub fn reset(&self, operation: &str) -> bool {
        let removed = self.lock().remove(operation).is_some();
        if removed {
            log::info!("Circuit '{}' reset", operation);
        }
        removed
    }

    /// Forget all breakers
    pub fn reset_all(&self) {
        self.lock().clear();
        log::info!("All circuits reset");
    }
}
