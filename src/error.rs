//! Unified error types for ingestwatch
//!
//! This module defines all error types used throughout the crate.
//! Uses thiserror for ergonomic error definitions.

use std::time::Duration;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from an executed operation
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Error from alert lifecycle operations
    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    /// Error from an external collaborator
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a wrapped operation
///
/// Wrapped calls return this so the executor can decide whether an attempt
/// is worth repeating.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Upstream answered with an HTTP error status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure (DNS, refused, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Request was malformed or failed validation
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Credentials rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Anything else, classified from its message
    #[error("{0}")]
    Other(String),
}

/// Errors returned by the operation executor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// Circuit breaker is open, the operation was not invoked
    #[error("Circuit open for '{operation}' after {failures} consecutive failures")]
    CircuitOpen { operation: String, failures: u32 },

    /// A single attempt did not finish in time
    #[error("Operation '{operation}' timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// A single attempt failed with a transient error
    #[error("Operation '{operation}' failed (retryable): {source}")]
    Retryable {
        operation: String,
        source: OperationError,
    },

    /// Non-retryable failure, propagated immediately
    #[error("Operation '{operation}' failed: {source}")]
    Terminal {
        operation: String,
        source: OperationError,
    },

    /// All attempts failed with transient errors
    #[error("Operation '{operation}' failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        operation: String,
        attempts: u32,
        last: Box<ExecutionError>,
    },
}

impl ExecutionError {
    /// Operation name the error belongs to
    pub fn operation(&self) -> &str {
        match self {
            Self::CircuitOpen { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Retryable { operation, .. }
            | Self::Terminal { operation, .. }
            | Self::ExhaustedRetries { operation, .. } => operation,
        }
    }

    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Retryable { .. })
    }
}

/// Errors from alert lifecycle operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    /// No unresolved alert with this id
    #[error("No active alert with id: {0}")]
    NotFound(String),
}

/// Errors from injected collaborators (stores, notifiers, providers, rule sources)
///
/// These are only ever logged; they never escape an evaluation tick.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// Durable store rejected a write
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// Notification channel failed
    #[error("Notification via {channel} failed: {message}")]
    Notification { channel: String, message: String },

    /// Metric provider could not collect
    #[error("Metric provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// Dynamic rules could not be loaded
    #[error("Rule loading failed: {0}")]
    RuleSource(String),

    /// IO error while talking to a collaborator
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Failed to parse config file
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
