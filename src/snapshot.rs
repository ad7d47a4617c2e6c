//! Instance snapshots and the source that produces them.
//!
//! A snapshot is one point-in-time read of every monitored instance. The
//! monitor never talks to the remote API directly; it asks a
//! [`SnapshotSource`] for the full list once per poll cycle and treats any
//! failure as all-or-nothing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Lifecycle state reported for an instance.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Running,
    Stopped,
    Stopping,
    Starting,
    Hibernated,
    Hibernating,
    Error,
    #[serde(other)]
    Unknown,
}

impl InstanceState {
    /// Lowercase wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Stopping => "stopping",
            Self::Starting => "starting",
            Self::Hibernated => "hibernated",
            Self::Hibernating => "hibernating",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceState {
    type Err = std::convert::Infallible;

    /// Unrecognized states parse as [`InstanceState::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "stopping" => Self::Stopping,
            "starting" | "pending" => Self::Starting,
            "hibernated" => Self::Hibernated,
            "hibernating" => Self::Hibernating,
            "error" => Self::Error,
            _ => Self::Unknown,
        })
    }
}

/// Idle-detection descriptor attached to an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleDetection {
    /// Whether idle detection is active for the instance.
    pub enabled: bool,
    /// Action taken when the instance stays idle (e.g. "stop", "hibernate").
    pub policy: String,
    /// Minutes the instance has been idle.
    #[serde(default)]
    pub idle_minutes: i64,
    /// Idle minutes after which the policy action is scheduled.
    #[serde(default)]
    pub threshold_minutes: i64,
    /// Minutes until the scheduled action, as reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_until_action: Option<i64>,
    /// Whether an action is currently scheduled.
    #[serde(default)]
    pub action_pending: bool,
    /// When the scheduled action fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_schedule: Option<DateTime<Utc>>,
}

impl IdleDetection {
    /// Enabled descriptor with no pending action.
    #[must_use]
    pub fn enabled(policy: impl Into<String>) -> Self {
        Self {
            enabled: true,
            policy: policy.into(),
            idle_minutes: 0,
            threshold_minutes: 0,
            minutes_until_action: None,
            action_pending: false,
            action_schedule: None,
        }
    }

    /// Marks an action as pending `minutes` from now.
    #[must_use]
    pub fn pending_in(mut self, minutes: i64) -> Self {
        self.action_pending = true;
        self.minutes_until_action = Some(minutes);
        self
    }

    /// Marks an action as pending at a fixed time.
    #[must_use]
    pub fn pending_at(mut self, at: DateTime<Utc>) -> Self {
        self.action_pending = true;
        self.action_schedule = Some(at);
        self
    }

    /// Minutes remaining until the scheduled action.
    ///
    /// The schedule timestamp wins over the reported countdown; whole minutes
    /// are truncated toward zero. Returns `None` when neither is known.
    #[must_use]
    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.action_schedule
            .map(|at| (at - now).num_minutes())
            .or(self.minutes_until_action)
    }
}

/// One instance as observed in a single snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    /// Unique instance identifier.
    pub id: String,
    /// Current lifecycle state.
    pub state: InstanceState,
    /// Estimated cost per day in dollars.
    #[serde(default)]
    pub estimated_daily_cost: f64,
    /// Idle-detection status, absent when the source does not report one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle: Option<IdleDetection>,
}

impl InstanceSnapshot {
    /// Creates a snapshot entry with zero cost and no idle descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>, state: InstanceState) -> Self {
        Self {
            id: id.into(),
            state,
            estimated_daily_cost: 0.0,
            idle: None,
        }
    }

    /// Sets the estimated daily cost.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.estimated_daily_cost = cost;
        self
    }

    /// Attaches an idle descriptor.
    #[must_use]
    pub fn with_idle(mut self, idle: IdleDetection) -> Self {
        self.idle = Some(idle);
        self
    }

    /// Cost used for aggregation: negative and NaN values count as zero.
    #[must_use]
    pub fn billable_cost(&self) -> f64 {
        if self.estimated_daily_cost.is_finite() && self.estimated_daily_cost > 0.0 {
            self.estimated_daily_cost
        } else {
            0.0
        }
    }
}

/// Deadline and cancellation handed to a snapshot source.
#[derive(Debug, Clone)]
pub struct FetchContext {
    deadline: Instant,
    timeout: Duration,
    cancelled: Arc<AtomicBool>,
}

impl FetchContext {
    /// Context that expires `timeout` from now and is never cancelled.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, Arc::new(AtomicBool::new(false)))
    }

    pub(crate) fn new(timeout: Duration, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            timeout,
            cancelled,
        }
    }

    /// Instant after which the fetch should give up.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline (zero once expired).
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// True once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// True once the owning monitor has been asked to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fails with the matching transport error if cancelled or expired.
    ///
    /// Sources doing multi-step work should call this between steps.
    pub fn check(&self) -> Result<(), TransportError> {
        if self.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if self.is_expired() {
            return Err(TransportError::Timeout {
                duration_ms: self.timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            });
        }
        Ok(())
    }
}

/// Produces the current set of instances.
///
/// A call either fully succeeds or fully fails; there is no partial result.
/// Implementations should respect `ctx` so a hung call cannot wedge the
/// poll loop.
pub trait SnapshotSource: Send + Sync {
    /// Fetch every monitored instance.
    fn list_instances(&self, ctx: &FetchContext) -> Result<Vec<InstanceSnapshot>, TransportError>;
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Arc<S> {
    fn list_instances(&self, ctx: &FetchContext) -> Result<Vec<InstanceSnapshot>, TransportError> {
        (**self).list_instances(ctx)
    }
}

/// Reads a JSON array of [`InstanceSnapshot`] from disk on every fetch.
///
/// Useful for running the monitor against a file maintained by another
/// process, and for local testing.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    /// Creates a source backed by `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for JsonFileSource {
    fn list_instances(&self, ctx: &FetchContext) -> Result<Vec<InstanceSnapshot>, TransportError> {
        ctx.check()?;
        let raw = std::fs::read_to_string(&self.path).map_err(|e| TransportError::FetchFailed {
            message: format!("{}: {e}", self.path.display()),
        })?;
        ctx.check()?;
        serde_json::from_str(&raw).map_err(|e| TransportError::Decode {
            message: e.to_string(),
        })
    }
}
