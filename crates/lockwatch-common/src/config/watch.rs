//! Engine configuration structures.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DEADLOCK_CHECK_INTERVAL_MS, DEFAULT_LONG_TRANSACTION_THRESHOLD_MS,
    DEFAULT_SLOW_QUERY_THRESHOLD_MS,
};
use crate::error::{LockWatchError, LockWatchResult};

/// Main engine configuration.
///
/// # Example
///
/// ```rust
/// use lockwatch_common::config::LockWatchConfig;
///
/// let config = LockWatchConfig::from_toml_str(
///     r#"
///     [deadlock]
///     check_on_request = true
///     "#,
/// )
/// .unwrap();
/// assert!(config.deadlock.check_on_request);
/// assert_eq!(config.registry.slow_query_threshold_ms, 1000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockWatchConfig {
    /// Transaction registry configuration.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Deadlock detection configuration.
    #[serde(default)]
    pub deadlock: DeadlockConfig,
}

/// Transaction registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Queries taking at least this long (ms) are reported as slow.
    #[serde(default = "default_slow_query_threshold")]
    pub slow_query_threshold_ms: u64,

    /// Transactions open at least this long (ms) are reported as long-running.
    #[serde(default = "default_long_transaction_threshold")]
    pub long_transaction_threshold_ms: u64,

    /// Keep a transaction's query history after its connection completes it.
    #[serde(default = "default_true")]
    pub retain_completed_contexts: bool,
}

/// Deadlock detection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlockConfig {
    /// Whether lock events are tracked at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Run a detection pass right after every lock request.
    #[serde(default)]
    pub check_on_request: bool,

    /// Period of the background monitor in milliseconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_ms: u64,

    /// Emit a warning log line for each detected deadlock.
    #[serde(default = "default_true")]
    pub log_events: bool,
}

fn default_slow_query_threshold() -> u64 {
    DEFAULT_SLOW_QUERY_THRESHOLD_MS
}

fn default_long_transaction_threshold() -> u64 {
    DEFAULT_LONG_TRANSACTION_THRESHOLD_MS
}

fn default_check_interval() -> u64 {
    DEFAULT_DEADLOCK_CHECK_INTERVAL_MS
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: default_slow_query_threshold(),
            long_transaction_threshold_ms: default_long_transaction_threshold(),
            retain_completed_contexts: true,
        }
    }
}

impl RegistryConfig {
    /// Returns the long-running transaction threshold as a duration.
    #[must_use]
    pub fn long_transaction_threshold(&self) -> Duration {
        Duration::from_millis(self.long_transaction_threshold_ms)
    }
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_on_request: false,
            check_interval_ms: default_check_interval(),
            log_events: true,
        }
    }
}

impl DeadlockConfig {
    /// Returns the monitor period as a duration.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl LockWatchConfig {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for configuration.
    #[must_use]
    pub fn builder() -> LockWatchConfigBuilder {
        LockWatchConfigBuilder::new()
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or a value fails
    /// validation.
    pub fn from_toml_str(content: &str) -> LockWatchResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// fails validation.
    pub fn from_file(path: &Path) -> LockWatchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Saves configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be rendered or written.
    pub fn save(&self, path: &Path) -> LockWatchResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> LockWatchResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks that all values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`LockWatchError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> LockWatchResult<()> {
        if self.deadlock.check_interval_ms == 0 {
            return Err(LockWatchError::invalid_config(
                "deadlock.check_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.registry.slow_query_threshold_ms == 0 {
            return Err(LockWatchError::invalid_config(
                "registry.slow_query_threshold_ms",
                "must be greater than zero",
            ));
        }
        if self.registry.long_transaction_threshold_ms == 0 {
            return Err(LockWatchError::invalid_config(
                "registry.long_transaction_threshold_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Builder for engine configuration.
#[derive(Debug, Default)]
pub struct LockWatchConfigBuilder {
    config: LockWatchConfig,
}

impl LockWatchConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the slow query threshold.
    #[must_use]
    pub fn slow_query_threshold_ms(mut self, ms: u64) -> Self {
        self.config.registry.slow_query_threshold_ms = ms;
        self
    }

    /// Sets the long-running transaction threshold.
    #[must_use]
    pub fn long_transaction_threshold_ms(mut self, ms: u64) -> Self {
        self.config.registry.long_transaction_threshold_ms = ms;
        self
    }

    /// Keeps or drops query history once a transaction completes.
    #[must_use]
    pub fn retain_completed_contexts(mut self, retain: bool) -> Self {
        self.config.registry.retain_completed_contexts = retain;
        self
    }

    /// Enables or disables lock tracking.
    #[must_use]
    pub fn deadlock_detection(mut self, enabled: bool) -> Self {
        self.config.deadlock.enabled = enabled;
        self
    }

    /// Runs detection after each lock request.
    #[must_use]
    pub fn check_on_request(mut self, enabled: bool) -> Self {
        self.config.deadlock.check_on_request = enabled;
        self
    }

    /// Sets the background monitor period.
    #[must_use]
    pub fn check_interval_ms(mut self, ms: u64) -> Self {
        self.config.deadlock.check_interval_ms = ms;
        self
    }

    /// Enables or disables warning logs for detected deadlocks.
    #[must_use]
    pub fn log_events(mut self, enabled: bool) -> Self {
        self.config.deadlock.log_events = enabled;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a value fails validation.
    pub fn build(self) -> LockWatchResult<LockWatchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
