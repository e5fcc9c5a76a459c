//! Resilience primitives
//!
//! Circuit breakers, retry policies, failure classification and the executor
//! that combines them.

mod breaker;
mod classify;
mod executor;
mod policy;

pub use breaker::{Admission, BreakerConfig, CircuitBreakerRegistry, CircuitState, CircuitStatus};
pub use classify::{classify_message, classify_status, ClassifyError, ErrorClass};
pub use executor::{duration_metric, outcome_metric, recovery_metric, Executor};
pub use policy::RetryPolicy;
