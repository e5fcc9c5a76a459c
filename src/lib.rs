//! ingestwatch - resilience and monitoring core
//!
//! This library wraps outbound calls with circuit breakers, retry with
//! exponential backoff and per-attempt timeouts, records time-series
//! metrics, and raises alerts when windowed aggregates cross thresholds.
//!
//! # Modules
//!
//! - [`alerts`]: Alert rules, evaluation, lifecycle and notification
//! - [`cli`]: Command-line interface definitions
//! - [`clock`]: Time source abstraction
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration system
//! - [`context`]: Shared breaker and metric state
//! - [`error`]: Error types
//! - [`health`]: Health derived from alerts
//! - [`metrics`]: Metric store and providers
//! - [`resilience`]: Circuit breakers, retry policy and the executor
//! - [`services`]: Evaluation loop and monitoring facade
//! - [`storage`]: Durable store collaborators

pub mod alerts;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod metrics;
pub mod resilience;
pub mod services;
pub mod storage;

pub use context::ResilienceContext;
pub use error::{AppError, Result};
pub use services::{Monitor, MonitorConfig};
