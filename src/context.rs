//! Shared resilience context
//!
//! Owns the clock, the circuit breaker registry and the metric store. The
//! executor and the monitor both hold a clone; independent contexts never
//! share state, so tests can build as many as they like.

use crate::clock::{Clock, SystemClock};
use crate::metrics::{MetricStore, MetricStoreConfig};
use crate::resilience::{BreakerConfig, CircuitBreakerRegistry};
use crate::storage::DurableStore;
use std::sync::Arc;

/// Handle to one set of breakers and metric series
#[derive(Debug, Clone)]
pub struct ResilienceContext {
    clock: Arc<dyn Clock>,
    breakers: Arc<CircuitBreakerRegistry>,
    metrics: Arc<MetricStore>,
}

impl ResilienceContext {
    /// Create a context on the system clock
    pub fn new(breaker: BreakerConfig, metrics: MetricStoreConfig) -> Self {
        Self::with_clock(breaker, metrics, Arc::new(SystemClock))
    }

    /// Create a context on a specific clock
    pub fn with_clock(
        breaker: BreakerConfig,
        metrics: MetricStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            breakers: Arc::new(CircuitBreakerRegistry::new(breaker, Arc::clone(&clock))),
            metrics: Arc::new(MetricStore::new(metrics, Arc::clone(&clock))),
            clock,
        }
    }

    /// Create a context whose metric points are mirrored to `store`
    pub fn with_store(
        breaker: BreakerConfig,
        metrics: MetricStoreConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        Self {
            breakers: Arc::new(CircuitBreakerRegistry::new(breaker, Arc::clone(&clock))),
            metrics: Arc::new(MetricStore::new(metrics, Arc::clone(&clock)).with_store(store)),
            clock,
        }
    }

    /// Time source
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Circuit breaker registry
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Metric store
    pub fn metrics(&self) -> &MetricStore {
        &self.metrics
    }
}

impl Default for ResilienceContext {
    fn default() -> Self {
        Self::new(BreakerConfig::default(), MetricStoreConfig::default())
    }
}
