//! # instance-monitor
//!
//! A background monitor for remotely managed compute instances. It samples
//! instance state on a fixed interval, turns successive snapshots into
//! meaningful events and distributes them to any number of independent
//! subscribers without letting a slow or absent consumer stall detection.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: one point-in-time read of every instance, from a [`SnapshotSource`]
//! - **Diff engine**: compares a snapshot with the last-observed state and emits events
//! - **Event**: state change, idle warning, cost alert or transport error
//! - **Subscription**: a bounded channel of events; slow readers miss events, never block
//! - **Notification mapper**: filters events by severity and builds notification requests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use instance_monitor::{InstanceMonitor, JsonFileSource, MonitorConfig};
//!
//! let source = Arc::new(JsonFileSource::new("instances.json"));
//! let monitor = InstanceMonitor::new(source, MonitorConfig::default())?;
//! let events = monitor.subscribe();
//! monitor.start()?;
//!
//! while let Ok(event) = events.recv() {
//!     println!("{}: {}", event.kind(), event.message());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod snapshot;

// Re-export primary types at crate root for convenience
pub use config::{MonitorConfig, NotificationConfig};
pub use error::{
    ConfigError, ExecutionError, MonitorError, MonitorResult, TransportError, ValidationError,
};
pub use monitor::{
    diff_snapshot, DiffSettings, EventKind, EventPayload, InstanceMonitor, MonitorEvent,
    MonitorState, MonitorStats, Severity, Subscription, SubscriptionId,
};
pub use notify::{
    LogSender, NotificationMapper, NotificationRequest, NotificationSender, Notifier, NotifyError,
};
pub use snapshot::{
    FetchContext, IdleDetection, InstanceSnapshot, InstanceState, JsonFileSource, SnapshotSource,
};
