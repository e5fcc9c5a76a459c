//! Operation executor
//!
//! Wraps a fallible async call with circuit breaking, per-attempt timeouts and
//! exponential backoff. Every attempt outcome is recorded to the breaker
//! registry and to the metric store as `operation.<name>.duration` (ms) and
//! `operation.<name>.outcome` (1 = success, 0 = failure).
//!
//! Timeouts only stop the caller from waiting: the timed-out future is dropped
//! at its current await point, so side effects it already started may still
//! complete. Callers must not assume exactly-once effects from a timed-out attempt.

use super::breaker::Admission;
use super::classify::{ClassifyError, ErrorClass};
use super::policy::RetryPolicy;
use crate::context::ResilienceContext;
use crate::error::{ExecutionError, OperationError};
use crate::metrics::Metadata;
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Metric name for attempt durations
pub fn duration_metric(operation: &str) -> String {
    format!("operation.{}.duration", operation)
}

/// Metric name for attempt outcomes
pub fn outcome_metric(operation: &str) -> String {
    format!("operation.{}.outcome", operation)
}

/// Metric name for recoveries after failed attempts
pub fn recovery_metric(operation: &str) -> String {
    format!("operation.{}.recovered", operation)
}

/// Retrying, circuit-breaking executor
#[derive(Debug, Clone)]
pub struct Executor {
    ctx: ResilienceContext,
    policy: RetryPolicy,
}

impl Executor {
    /// Create an executor with a default retry policy
    pub fn new(ctx: ResilienceContext, policy: RetryPolicy) -> Self {
        Self { ctx, policy }
    }

    /// Shared context
    pub fn context(&self) -> &ResilienceContext {
        &self.ctx
    }

    /// Default retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` under the breaker for `operation`, retrying transient failures
    ///
    /// Returns the first successful value, or exactly one of
    /// [`ExecutionError::CircuitOpen`], [`ExecutionError::Terminal`] or
    /// [`ExecutionError::ExhaustedRetries`].
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
        policy: Option<&RetryPolicy>,
    ) -> Result<T, ExecutionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let policy = policy.copied().unwrap_or(self.policy);
        let breakers = self.ctx.breakers();
        let mut attempt: u32 = 0;

        loop {
            if let Admission::Rejected { failures } = breakers.admit(operation) {
                log::debug!("Rejecting call to '{}': circuit open", operation);
                return Err(ExecutionError::CircuitOpen {
                    operation: operation.to_string(),
                    failures,
                });
            }

            let started = Instant::now();
            let outcome = tokio::time::timeout(policy.attempt_timeout, call()).await;
            let elapsed = started.elapsed();

            let error = match outcome {
                Ok(Ok(value)) => {
                    self.record_success(operation, elapsed, attempt);
                    return Ok(value);
                }
                Ok(Err(source)) => match source.class() {
                    ErrorClass::Retryable => ExecutionError::Retryable {
                        operation: operation.to_string(),
                        source,
                    },
                    ErrorClass::Terminal => ExecutionError::Terminal {
                        operation: operation.to_string(),
                        source,
                    },
                },
                Err(_) => ExecutionError::Timeout {
                    operation: operation.to_string(),
                    timeout: policy.attempt_timeout,
                },
            };

            self.record_failure(operation, elapsed, attempt, &error);

            if !error.is_retryable() {
                return Err(error);
            }

            if attempt >= policy.max_retries {
                log::warn!(
                    "Operation '{}' failed after {} attempts: {}",
                    operation,
                    attempt + 1,
                    error
                );
                return Err(ExecutionError::ExhaustedRetries {
                    operation: operation.to_string(),
                    attempts: attempt + 1,
                    last: Box::new(error),
                });
            }

            // Stop retrying as soon as this run tripped the breaker
            if let Admission::Rejected { failures } = breakers.admit(operation) {
                return Err(ExecutionError::CircuitOpen {
                    operation: operation.to_string(),
                    failures,
                });
            }

            let delay = policy.delay_for_attempt(attempt);
            log::debug!(
                "Attempt {} of '{}' failed ({}), retrying in {:?}",
                attempt + 1,
                operation,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Run `call` for every item, `chunk_size` items at a time
    ///
    /// Each chunk runs concurrently and is awaited in full before the next one
    /// starts. Results are returned in input order.
    pub async fn execute_batch<I, T, F, Fut>(
        &self,
        operation: &str,
        items: &[I],
        chunk_size: usize,
        call: F,
        policy: Option<&RetryPolicy>,
    ) -> Vec<Result<T, ExecutionError>>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let mut results = Vec::with_capacity(items.len());
        let call = &call;

        for chunk in items.chunks(chunk_size.max(1)) {
            let calls = chunk
                .iter()
                .map(|item| self.execute(operation, move || call(item.clone()), policy));
            results.extend(join_all(calls).await);
        }

        results
    }

    fn record_success(&self, operation: &str, elapsed: Duration, attempt: u32) {
        self.ctx.breakers().record_success(operation);

        let metrics = self.ctx.metrics();
        metrics.record(&duration_metric(operation), millis(elapsed), None);
        metrics.record(&outcome_metric(operation), 1.0, None);

        if attempt > 0 {
            log::info!(
                "Operation '{}' recovered after {} failed attempt(s)",
                operation,
                attempt
            );
            metrics.record(&recovery_metric(operation), f64::from(attempt), None);
        }
    }

    fn record_failure(
        &self,
        operation: &str,
        elapsed: Duration,
        attempt: u32,
        error: &ExecutionError,
    ) {
        self.ctx.breakers().record_failure(operation);

        let mut metadata = Metadata::new();
        metadata.insert("attempt".to_string(), serde_json::json!(attempt + 1));
        metadata.insert("error".to_string(), serde_json::json!(error.to_string()));

        let metrics = self.ctx.metrics();
        metrics.record(&duration_metric(operation), millis(elapsed), None);
        metrics.record(&outcome_metric(operation), 0.0, Some(metadata));
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
