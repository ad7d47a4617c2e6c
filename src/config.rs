//! Monitor configuration.
//!
//! All values are read once when the monitor is constructed; changing them
//! requires a restart. Files are plain JSON and every field is optional.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};
use crate::monitor::events::Severity;

/// Settings for the notification mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Whether monitor events are turned into notifications at all.
    pub enabled: bool,
    /// Events below this severity are not forwarded.
    pub min_severity: Severity,
    /// Application name used in generic titles.
    pub app_name: String,
    /// Display duration for ordinary notifications.
    pub default_timeout_secs: u32,
    /// Display duration for idle warnings and cost alerts.
    pub urgent_timeout_secs: u32,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_severity: Severity::Warning,
            app_name: "Instance Monitor".to_string(),
            default_timeout_secs: 5,
            urgent_timeout_secs: 10,
        }
    }
}

/// Configuration for [`crate::InstanceMonitor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Upper bound for a single snapshot fetch.
    pub fetch_timeout_secs: u64,
    /// Lead time, in minutes, for idle-action warnings.
    pub idle_notify_minutes: i64,
    /// Aggregate daily cost (dollars) above which a cost alert fires.
    pub cost_alert_threshold: f64,
    /// Emit an event when an instance disappears from the snapshot.
    pub emit_removal_events: bool,
    /// Capacity of the shared event queue.
    pub queue_capacity: usize,
    /// Capacity of each subscriber channel.
    pub subscriber_capacity: usize,
    /// Notification mapper settings.
    pub notifications: NotificationConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            fetch_timeout_secs: 30,
            idle_notify_minutes: 5,
            cost_alert_threshold: 10.0,
            emit_removal_events: false,
            queue_capacity: 100,
            subscriber_capacity: 10,
            notifications: NotificationConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Parses a JSON document and validates it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON and
    /// `ConfigError::Invalid` when a value fails validation.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise the
    /// same errors as [`MonitorConfig::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// Checks every value is usable.
    ///
    /// # Errors
    ///
    /// Returns the first offending value as a `ValidationError`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_secs == 0 {
            return Err(ValidationError::ZeroPollInterval);
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ValidationError::ZeroFetchTimeout);
        }
        if self.idle_notify_minutes < 0 {
            return Err(ValidationError::NegativeIdleThreshold {
                minutes: self.idle_notify_minutes,
            });
        }
        if !self.cost_alert_threshold.is_finite() || self.cost_alert_threshold < 0.0 {
            return Err(ValidationError::InvalidCostThreshold {
                value: self.cost_alert_threshold,
            });
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::ZeroCapacity {
                field: "queue_capacity".to_string(),
            });
        }
        if self.subscriber_capacity == 0 {
            return Err(ValidationError::ZeroCapacity {
                field: "subscriber_capacity".to_string(),
            });
        }
        Ok(())
    }

    /// Poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Fetch timeout as a `Duration`.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
