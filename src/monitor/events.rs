//! Event types emitted by the instance monitor.
//!
//! Events are immutable once constructed and serializable so consumers can
//! forward them over other transports. The kind of an event is derived from
//! its payload, which keeps the two from ever disagreeing.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::snapshot::InstanceState;

/// Event severity. Ordered `Info < Warning < Error`.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(ValidationError::UnknownSeverity {
                value: other.to_string(),
            }),
        }
    }
}

/// Closed set of event kinds.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StateChange,
    IdleWarning,
    CostAlert,
    TransportError,
    InstanceRemoved,
}

impl EventKind {
    /// Snake-case name, as used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StateChange => "state_change",
            Self::IdleWarning => "idle_warning",
            Self::CostAlert => "cost_alert",
            Self::TransportError => "transport_error",
            Self::InstanceRemoved => "instance_removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific event data.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Lifecycle state differs from the previous cycle.
    StateChange {
        old_state: InstanceState,
        new_state: InstanceState,
    },

    /// A pending idle action is within the notify lead time.
    IdleWarning {
        action: String,
        idle_minutes: i64,
        threshold_minutes: i64,
        minutes_left: i64,
    },

    /// Aggregate daily cost of the snapshot exceeds the configured threshold.
    CostAlert {
        total_cost: f64,
        threshold: f64,
        instance_count: usize,
    },

    /// A periodic snapshot fetch failed.
    TransportError {
        error: String,
    },

    /// An instance is no longer present in the snapshot.
    InstanceRemoved {
        last_state: InstanceState,
    },
}

impl EventPayload {
    /// Kind corresponding to this payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StateChange { .. } => EventKind::StateChange,
            Self::IdleWarning { .. } => EventKind::IdleWarning,
            Self::CostAlert { .. } => EventKind::CostAlert,
            Self::TransportError { .. } => EventKind::TransportError,
            Self::InstanceRemoved { .. } => EventKind::InstanceRemoved,
        }
    }
}

/// A detected, semantically meaningful change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    instance: String,
    message: String,
    severity: Severity,
    timestamp: DateTime<Utc>,
    payload: EventPayload,
}

impl MonitorEvent {
    /// Lifecycle state change for one instance.
    #[must_use]
    pub fn state_change(
        instance: impl Into<String>,
        old_state: InstanceState,
        new_state: InstanceState,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            instance: instance.into(),
            message: format!("Instance state changed from {old_state} to {new_state}"),
            severity: Severity::Info,
            timestamp,
            payload: EventPayload::StateChange { old_state, new_state },
        }
    }

    /// Idle action approaching for one instance.
    #[must_use]
    pub fn idle_warning(
        instance: impl Into<String>,
        action: impl Into<String>,
        idle_minutes: i64,
        threshold_minutes: i64,
        minutes_left: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let action = action.into();
        Self {
            instance: instance.into(),
            message: format!("Instance will {action} in {minutes_left} minutes due to inactivity"),
            severity: Severity::Warning,
            timestamp,
            payload: EventPayload::IdleWarning {
                action,
                idle_minutes,
                threshold_minutes,
                minutes_left,
            },
        }
    }

    /// System-wide cost threshold breach.
    #[must_use]
    pub fn cost_alert(
        total_cost: f64,
        threshold: f64,
        instance_count: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            instance: String::new(),
            message: format!("Daily cost (${total_cost:.2}) exceeds threshold (${threshold:.2})"),
            severity: Severity::Warning,
            timestamp,
            payload: EventPayload::CostAlert {
                total_cost,
                threshold,
                instance_count,
            },
        }
    }

    /// Failed periodic refresh.
    #[must_use]
    pub fn transport_error(error: impl fmt::Display, timestamp: DateTime<Utc>) -> Self {
        let error = error.to_string();
        Self {
            instance: String::new(),
            message: format!("Failed to refresh instances: {error}"),
            severity: Severity::Error,
            timestamp,
            payload: EventPayload::TransportError { error },
        }
    }

    /// Instance disappeared from the snapshot.
    #[must_use]
    pub fn instance_removed(
        instance: impl Into<String>,
        last_state: InstanceState,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let instance = instance.into();
        Self {
            message: format!("Instance {instance} is no longer reported"),
            instance,
            severity: Severity::Info,
            timestamp,
            payload: EventPayload::InstanceRemoved { last_state },
        }
    }

    /// Event kind, derived from the payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Subject instance; empty for system-wide events.
    #[must_use]
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Severity level.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// When the change was detected.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Kind-specific data.
    #[must_use]
    pub const fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// True for events not tied to a single instance.
    #[must_use]
    pub fn is_system_wide(&self) -> bool {
        self.instance.is_empty()
    }
}

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
