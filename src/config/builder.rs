//! Configuration builder
//!
//! Merges configuration from files and CLI arguments.

use crate::config::{Config, ConfigFile};
use crate::error::ConfigError;
use std::path::PathBuf;

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load configuration from a file
    ///
    /// An explicit path must load; without one the default locations are tried.
    pub fn with_file(mut self, path: Option<&str>) -> Result<Self, ConfigError> {
        let file_config = match path {
            Some(path) => Some(ConfigFile::load(path)?),
            None => ConfigFile::load_default(),
        };

        if let Some(cfg) = file_config {
            self.config = cfg;
        }

        Ok(self)
    }

    /// Override with CLI verbose flag
    pub fn with_verbose(mut self, verbose: Option<bool>) -> Self {
        if let Some(v) = verbose {
            self.config.general.verbose = v;
        }
        self
    }

    /// Override with CLI tick interval
    pub fn with_interval(mut self, interval: Option<u64>) -> Self {
        if let Some(i) = interval {
            self.config.evaluation.tick_interval_secs = i;
        }
        self
    }

    /// Override with CLI rules file
    pub fn with_rules_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.config.evaluation.rules_file = Some(p);
        }
        self
    }

    /// Override with CLI aggregation
    pub fn with_aggregation(mut self, aggregation: Option<String>) -> Self {
        if let Some(a) = aggregation {
            self.config.evaluation.aggregation = a;
        }
        self
    }

    /// Override with CLI storage path
    pub fn with_storage(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.config.storage.path = Some(p);
        }
        self
    }

    /// Override with CLI retry count
    pub fn with_max_retries(mut self, retries: Option<u32>) -> Self {
        if let Some(r) = retries {
            self.config.retry.max_retries = r;
        }
        self
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
