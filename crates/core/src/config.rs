//! Orchestrator Configuration
//!
//! Per-run options plus the TOML-backed configuration that supplies the retry
//! policy and run defaults.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Options for a single run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Report the plan without executing anything
    pub dry_run: bool,

    /// Run independent tasks concurrently, level by level
    pub parallel: bool,

    /// Restrict the run to these tasks and their transitive dependencies
    pub only: Option<BTreeSet<String>>,

    /// Stop starting new tasks once this much time has passed
    pub timeout: Option<Duration>,
}

impl RunOptions {
    /// Sequential, non-dry run of every task
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable dry run mode
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable or disable parallel mode
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Restrict the run to the named tasks
    #[must_use]
    pub fn with_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set a run timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Retry section of the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Attempts per task, including the first
    pub max_attempts: u32,
    /// Backoff unit in milliseconds
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
        }
    }
}

/// Run section of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// Default for [`RunOptions::dry_run`]
    pub dry_run: bool,
    /// Default for [`RunOptions::parallel`]
    pub parallel: bool,
    /// Default for [`RunOptions::only`]; empty means every task
    pub only: Vec<String>,
    /// Default run timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Configuration for the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Retry policy
    pub retry: RetrySettings,
    /// Run defaults
    pub run: RunSettings,
}

impl OrchestratorConfig {
    /// Parse a configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not valid configuration
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Set the retry attempts
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    /// Set the backoff unit in milliseconds
    #[must_use]
    pub fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.retry.backoff_ms = backoff_ms;
        self
    }

    /// The retry policy described by this configuration
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.backoff_ms),
        )
    }

    /// Run options seeded from the configured defaults
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.run.dry_run,
            parallel: self.run.parallel,
            only: (!self.run.only.is_empty()).then(|| self.run.only.iter().cloned().collect()),
            timeout: self.run.timeout_secs.map(Duration::from_secs),
        }
    }
}
