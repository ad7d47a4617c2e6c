//! Error types for the instance monitor.
//!
//! All errors are strongly typed using thiserror so callers can pattern
//! match on specific conditions. Only startup failures and lifecycle misuse
//! cross the monitor API as errors; steady-state failures are folded into
//! the event stream instead.

use thiserror::Error;

/// Validation errors raised while checking configuration values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Fetch timeout must be greater than zero")]
    ZeroFetchTimeout,

    #[error("Capacity '{field}' must be greater than zero")]
    ZeroCapacity {
        field: String,
    },

    #[error("Cost alert threshold {value} must be a finite, non-negative number")]
    InvalidCostThreshold {
        value: f64,
    },

    #[error("Idle notify threshold {minutes} must not be negative")]
    NegativeIdleThreshold {
        minutes: i64,
    },

    #[error("Unknown severity '{value}' (expected info, warning or error)")]
    UnknownSeverity {
        value: String,
    },
}

/// Execution errors raised by the monitor lifecycle and channels.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Monitor is not running")]
    NotRunning,

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Failed to spawn worker '{name}': {message}")]
    SpawnFailed {
        name: String,
        message: String,
    },
}

/// Errors produced by a snapshot source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("Snapshot fetch failed: {message}")]
    FetchFailed {
        message: String,
    },

    #[error("Snapshot fetch timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Snapshot fetch cancelled")]
    Cancelled,

    #[error("Failed to decode snapshot: {message}")]
    Decode {
        message: String,
    },
}

impl TransportError {
    /// Creates a generic fetch failure.
    #[must_use]
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed {
            message: message.into(),
        }
    }
}

/// Errors loading configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Io {
        path: String,
        message: String,
    },

    #[error("Failed to parse config: {message}")]
    Parse {
        message: String,
    },

    #[error("Invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// Top-level error type for the instance monitor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MonitorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The seed refresh performed by `start` failed; the monitor is not running.
    #[error("Failed to initialize instance states: {0}")]
    Startup(#[source] TransportError),
}

impl MonitorError {
    /// Returns true if this is a startup (seed fetch) failure.
    #[must_use]
    pub const fn is_startup(&self) -> bool {
        matches!(self, Self::Startup(_))
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Config(_) => false,
            Self::Execution(e) => matches!(e, ExecutionError::Timeout { .. }),
            Self::Transport(e) | Self::Startup(e) => {
                matches!(e, TransportError::FetchFailed { .. } | TransportError::Timeout { .. })
            }
        }
    }
}

/// Result type alias for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
