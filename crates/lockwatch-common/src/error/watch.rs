//! LockWatch error types.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // I/O errors (0x0100 - 0x01FF)
    /// General I/O error.
    Io = 0x0100,

    // Configuration errors (0x0200 - 0x02FF)
    /// A configuration value is out of range.
    InvalidConfig = 0x0200,
    /// Configuration text could not be parsed.
    ConfigParse = 0x0201,
    /// Configuration could not be rendered.
    ConfigSerialize = 0x0202,

    // Monitor errors (0x0300 - 0x03FF)
    /// The background monitor is already running.
    MonitorRunning = 0x0300,
    /// The background monitor thread could not be started.
    MonitorSpawn = 0x0301,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x01 => "I/O",
            0x02 => "Configuration",
            0x03 => "Monitor",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for LockWatch.
///
/// # Example
///
/// ```rust
/// use lockwatch_common::error::{ErrorCode, LockWatchError};
///
/// let err = LockWatchError::invalid_config("deadlock.check_interval_ms", "must be positive");
/// assert_eq!(err.code(), ErrorCode::InvalidConfig);
/// ```
#[derive(Debug, Error)]
pub enum LockWatchError {
    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A configuration field holds an unusable value.
    #[error("invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        /// Dotted path of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Configuration text is not valid TOML for the expected schema.
    #[error("failed to parse configuration: {source}")]
    ConfigParse {
        /// The underlying parse error.
        #[from]
        source: toml::de::Error,
    },

    /// Configuration could not be rendered as TOML.
    #[error("failed to serialize configuration: {source}")]
    ConfigSerialize {
        /// The underlying serialization error.
        #[from]
        source: toml::ser::Error,
    },

    /// A monitor is already attached to this engine.
    #[error("deadlock monitor is already running")]
    MonitorRunning,

    /// The monitor thread could not be spawned.
    #[error("failed to spawn deadlock monitor: {source}")]
    MonitorSpawn {
        /// The underlying spawn error.
        source: std::io::Error,
    },
}

impl LockWatchError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::Io,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::ConfigParse { .. } => ErrorCode::ConfigParse,
            Self::ConfigSerialize { .. } => ErrorCode::ConfigSerialize,
            Self::MonitorRunning => ErrorCode::MonitorRunning,
            Self::MonitorSpawn { .. } => ErrorCode::MonitorSpawn,
        }
    }

    /// Returns true if this error came from configuration handling.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::ConfigParse { .. } | Self::ConfigSerialize { .. }
        )
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
